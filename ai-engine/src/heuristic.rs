//! Rule-based fallback scorer
//!
//! Additive anomaly points over a normalised vector, squashed through a
//! shifted sigmoid. Needs nothing but the feature statistics, which are only
//! used to recover the wall-clock hour from the normalised `Time` field.

use crate::network::sigmoid;
use crate::preprocessing::FittedStatistics;
use fraud_core::{FeatureVector, FEATURE_NAMES, TIME_INDEX};
use serde::Serialize;
use std::sync::Arc;

// Rule weights
const AMOUNT_OUTLIER_POINTS: f64 = 0.15;
const PCA_OUTLIER_POINTS: f64 = 0.12;
const PCA_OUTLIER_CAP: usize = 4;
const COMBINATION_POINTS: f64 = 0.15;
const COMBINATION_MIN_INDICATORS: usize = 3;
const LOW_TRAFFIC_POINTS: f64 = 0.05;

/// |z| above this is an outlier
const OUTLIER_SIGMA: f64 = 3.0;

// Hour-of-day window [start, end) treated as low traffic
const LOW_TRAFFIC_START_HOUR: f64 = 0.0;
const LOW_TRAFFIC_END_HOUR: f64 = 6.0;

const SQUASH_GAIN: f64 = 4.0;
const SQUASH_MIDPOINT: f64 = 0.5;

/// Per-rule contributions for one vector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicBreakdown {
    pub amount_points: f64,
    pub pca_points: f64,
    pub combination_points: f64,
    pub time_points: f64,
    pub raw_points: f64,
    pub probability: f64,
    /// Hour of day recovered from `Time`
    pub hour_of_day: f64,
    /// Fields that tripped an outlier rule (Amount first, then V1..V28)
    pub triggered: Vec<&'static str>,
}

impl HeuristicBreakdown {
    pub fn indicator_count(&self) -> usize {
        self.triggered.len()
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicPredictor {
    stats: Arc<FittedStatistics>,
}

impl HeuristicPredictor {
    pub fn new(stats: Arc<FittedStatistics>) -> Self {
        Self { stats }
    }

    pub fn statistics(&self) -> &FittedStatistics {
        &self.stats
    }

    /// Fraud probability for a normalised vector
    pub fn score(&self, vector: &FeatureVector) -> f64 {
        self.explain(vector).probability
    }

    pub fn explain(&self, vector: &FeatureVector) -> HeuristicBreakdown {
        let mut triggered = Vec::new();

        let amount_points = if vector.amount().abs() > OUTLIER_SIGMA {
            triggered.push("Amount");
            AMOUNT_OUTLIER_POINTS
        } else {
            0.0
        };

        let mut pca_hits = 0;
        for (n, value) in vector.pca_components().iter().enumerate() {
            if value.abs() > OUTLIER_SIGMA {
                pca_hits += 1;
                triggered.push(FEATURE_NAMES[n + 1]);
            }
        }
        let pca_points = pca_hits.min(PCA_OUTLIER_CAP) as f64 * PCA_OUTLIER_POINTS;

        let combination_points = if triggered.len() >= COMBINATION_MIN_INDICATORS {
            COMBINATION_POINTS
        } else {
            0.0
        };

        let hour_of_day = self.hour_of_day(vector);
        let time_points =
            if (LOW_TRAFFIC_START_HOUR..LOW_TRAFFIC_END_HOUR).contains(&hour_of_day) {
                LOW_TRAFFIC_POINTS
            } else {
                0.0
            };

        let raw_points = amount_points + pca_points + combination_points + time_points;
        let probability = sigmoid(SQUASH_GAIN * (raw_points - SQUASH_MIDPOINT));

        HeuristicBreakdown {
            amount_points,
            pca_points,
            combination_points,
            time_points,
            raw_points,
            probability,
            hour_of_day,
            triggered,
        }
    }

    /// `Time` is seconds since the first transaction of the capture window
    fn hour_of_day(&self, vector: &FeatureVector) -> f64 {
        let seconds = self.stats.denormalize(TIME_INDEX, vector.time());
        (seconds / 3600.0).rem_euclid(24.0)
    }
}
