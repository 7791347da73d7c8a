//! Standard-score normalisation with statistics fitted once on a reference
//! dataset and replayed unchanged at inference time.

use crate::artifact::{self, ArtifactKind};
use fraud_core::{FeatureVector, FraudError, Result, FEATURE_COUNT, FEATURE_NAMES};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Where the statistics in use came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsSource {
    /// Fitted on data (in this process or loaded from an artifact)
    Fitted,
    /// Mean 0 / scale 1 stand-in; raw values pass through unchanged
    Identity,
}

/// Per-field `(mean, scale)` pairs. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedStatistics {
    means: [f64; FEATURE_COUNT],
    scales: [f64; FEATURE_COUNT],
    degenerate: [bool; FEATURE_COUNT],
    fitted_rows: usize,
    source: StatisticsSource,
}

/// Serialized form inside the artifact envelope
#[derive(Debug, Serialize, Deserialize)]
struct StatisticsPayload {
    feature_names: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
    #[serde(default)]
    degenerate: Vec<String>,
    fitted_rows: usize,
}

impl FittedStatistics {
    pub fn identity() -> Self {
        Self {
            means: [0.0; FEATURE_COUNT],
            scales: [1.0; FEATURE_COUNT],
            degenerate: [false; FEATURE_COUNT],
            fitted_rows: 0,
            source: StatisticsSource::Identity,
        }
    }

    pub fn mean(&self, idx: usize) -> f64 {
        self.means[idx]
    }

    pub fn scale(&self, idx: usize) -> f64 {
        self.scales[idx]
    }

    pub fn means(&self) -> &[f64; FEATURE_COUNT] {
        &self.means
    }

    pub fn scales(&self) -> &[f64; FEATURE_COUNT] {
        &self.scales
    }

    pub fn is_degenerate(&self, idx: usize) -> bool {
        self.degenerate[idx]
    }

    /// Names of zero-variance fields whose scale was substituted with 1.0
    pub fn degenerate_fields(&self) -> Vec<&'static str> {
        FEATURE_NAMES
            .iter()
            .zip(self.degenerate.iter())
            .filter(|(_, &flag)| flag)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    pub fn source(&self) -> StatisticsSource {
        self.source
    }

    /// `(value - mean) / scale` for every field
    pub fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector> {
        let mut out = [0.0; FEATURE_COUNT];
        for (idx, value) in raw.values().iter().enumerate() {
            out[idx] = (value - self.means[idx]) / self.scales[idx];
        }
        FeatureVector::from_values(out)
            .map_err(|e| FraudError::InvalidFeatureVector(format!("after normalisation: {}", e)))
    }

    /// Inverse of `transform` for a single field
    pub fn denormalize(&self, idx: usize, value: f64) -> f64 {
        value * self.scales[idx] + self.means[idx]
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = StatisticsPayload {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            means: self.means.to_vec(),
            scales: self.scales.to_vec(),
            degenerate: self
                .degenerate_fields()
                .into_iter()
                .map(str::to_string)
                .collect(),
            fitted_rows: self.fitted_rows,
        };
        let bytes = serde_json::to_vec(&payload)?;
        artifact::write(path, ArtifactKind::Statistics, &bytes)?;

        info!(path = %path.display(), rows = self.fitted_rows, "Saved fitted statistics");
        Ok(())
    }

    /// Load and validate. Anything short of exactly 30 finite pairs in the
    /// canonical field order is rejected as a whole.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = artifact::read(path, ArtifactKind::Statistics)?;
        let payload: StatisticsPayload = serde_json::from_slice(&bytes)
            .map_err(|e| FraudError::corrupt(path, format!("invalid statistics payload: {}", e)))?;

        if payload.feature_names.len() != FEATURE_COUNT
            || payload.means.len() != FEATURE_COUNT
            || payload.scales.len() != FEATURE_COUNT
        {
            return Err(FraudError::corrupt(
                path,
                format!(
                    "expected {} (mean, scale) pairs, found {} names / {} means / {} scales",
                    FEATURE_COUNT,
                    payload.feature_names.len(),
                    payload.means.len(),
                    payload.scales.len()
                ),
            ));
        }

        if let Some((idx, name)) = payload
            .feature_names
            .iter()
            .enumerate()
            .find(|(idx, name)| name.as_str() != FEATURE_NAMES[*idx])
        {
            return Err(FraudError::corrupt(
                path,
                format!("field {} is '{}', expected '{}'", idx, name, FEATURE_NAMES[idx]),
            ));
        }

        let mut means = [0.0; FEATURE_COUNT];
        let mut scales = [0.0; FEATURE_COUNT];
        let mut degenerate = [false; FEATURE_COUNT];
        for idx in 0..FEATURE_COUNT {
            let (mean, scale) = (payload.means[idx], payload.scales[idx]);
            if !mean.is_finite() || !scale.is_finite() || scale <= 0.0 {
                return Err(FraudError::corrupt(
                    path,
                    format!(
                        "invalid pair for {}: mean={}, scale={}",
                        FEATURE_NAMES[idx], mean, scale
                    ),
                ));
            }
            means[idx] = mean;
            scales[idx] = scale;
            degenerate[idx] = payload.degenerate.iter().any(|d| d == FEATURE_NAMES[idx]);
        }

        info!(path = %path.display(), rows = payload.fitted_rows, "Loaded fitted statistics");
        Ok(Self {
            means,
            scales,
            degenerate,
            fitted_rows: payload.fitted_rows,
            source: StatisticsSource::Fitted,
        })
    }
}

/// Stateless façade over fitting and transforming
pub struct Preprocessor;

impl Preprocessor {
    pub const MIN_FIT_ROWS: usize = 2;

    /// Mean and population standard deviation per field
    pub fn fit(rows: &[FeatureVector]) -> Result<FittedStatistics> {
        if rows.len() < Self::MIN_FIT_ROWS {
            return Err(FraudError::InsufficientData(format!(
                "need at least {} rows to fit statistics, got {}",
                Self::MIN_FIT_ROWS,
                rows.len()
            )));
        }

        let matrix = Array2::from_shape_fn((rows.len(), FEATURE_COUNT), |(i, j)| rows[i].values()[j]);
        let column_means = matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| FraudError::InsufficientData("no rows to fit".to_string()))?;
        // ddof 0: population standard deviation
        let column_stds = matrix.std_axis(Axis(0), 0.0);

        let mut means = [0.0; FEATURE_COUNT];
        let mut scales = [1.0; FEATURE_COUNT];
        let mut degenerate = [false; FEATURE_COUNT];

        for idx in 0..FEATURE_COUNT {
            let (mean, std_dev) = (column_means[idx], column_stds[idx]);
            if !mean.is_finite() || !std_dev.is_finite() {
                return Err(FraudError::InsufficientData(format!(
                    "statistics for {} overflowed",
                    FEATURE_NAMES[idx]
                )));
            }

            means[idx] = mean;
            if std_dev <= f64::EPSILON * mean.abs().max(1.0) {
                warn!(field = FEATURE_NAMES[idx], "Zero-variance field, substituting scale 1.0");
                degenerate[idx] = true;
            } else {
                scales[idx] = std_dev;
            }
        }

        info!(
            rows = rows.len(),
            degenerate = degenerate.iter().filter(|d| **d).count(),
            "Fitted feature statistics"
        );

        Ok(FittedStatistics {
            means,
            scales,
            degenerate,
            fitted_rows: rows.len(),
            source: StatisticsSource::Fitted,
        })
    }

    pub fn transform(raw: &FeatureVector, stats: &FittedStatistics) -> Result<FeatureVector> {
        stats.transform(raw)
    }

    pub fn transform_batch(
        rows: &[FeatureVector],
        stats: &FittedStatistics,
    ) -> Result<Vec<FeatureVector>> {
        rows.iter().map(|row| stats.transform(row)).collect()
    }

    pub fn load(path: &Path) -> Result<FittedStatistics> {
        FittedStatistics::load(path)
    }
}
