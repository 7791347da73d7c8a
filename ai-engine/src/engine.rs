//! Scoring engine: backend selection and the single scoring entry point
//!
//! The backend is chosen once, lazily, on first use:
//!
//! - statistics and network both load → `MODEL`
//! - anything else (missing, corrupt, or a loader panic) → `HEURISTIC`, using
//!   the loaded statistics when they are usable and identity statistics
//!   otherwise
//!
//! Artifact problems are logged and absorbed here. They never reach callers of
//! `score`.

use crate::heuristic::HeuristicPredictor;
use crate::metrics::ScoringMetrics;
use crate::model::ModelConfig;
use crate::network::NeuralPredictor;
use crate::predictor::Predictor;
use crate::preprocessing::{FittedStatistics, StatisticsSource};
use crate::recorder::RecorderHandle;
use chrono::{DateTime, Utc};
use fraud_core::{Backend, FeatureVector, FraudError, Result, ScoreResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

const MAX_SCORING_LATENCY_MS: u128 = 50;

/// Backend chosen at initialisation, plus the statistics used to normalise
pub struct BackendSelection {
    predictor: Box<dyn Predictor>,
    statistics: Arc<FittedStatistics>,
    fallback_reason: Option<String>,
    selected_at: DateTime<Utc>,
}

impl BackendSelection {
    pub fn backend(&self) -> Backend {
        self.predictor.backend()
    }

    pub fn statistics(&self) -> &FittedStatistics {
        &self.statistics
    }

    /// Why the model backend was not selected, if it wasn't
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }
}

/// Health/audit snapshot of the active backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub backend: Backend,
    pub statistics_source: StatisticsSource,
    pub fallback_reason: Option<String>,
    pub statistics_path: PathBuf,
    pub network_path: PathBuf,
    pub degenerate_fields: Vec<String>,
    pub selected_at: DateTime<Utc>,
}

pub struct ScoringEngine {
    config: ModelConfig,
    state: OnceLock<BackendSelection>,
    metrics: ScoringMetrics,
}

impl ScoringEngine {
    /// Nothing is loaded until the first `score` or `active_backend` call
    pub fn new(config: ModelConfig) -> Result<Self> {
        Ok(Self {
            config,
            state: OnceLock::new(),
            metrics: ScoringMetrics::new()?,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ScoringMetrics {
        &self.metrics
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// Selected backend; initialises on first call
    pub fn active_backend(&self) -> Backend {
        self.selection().backend()
    }

    pub fn selection(&self) -> &BackendSelection {
        self.state.get_or_init(|| {
            let selection = select_backend(&self.config);
            self.metrics.set_backend(selection.backend());
            selection
        })
    }

    pub fn status(&self) -> EngineStatus {
        let selection = self.selection();
        EngineStatus {
            backend: selection.backend(),
            statistics_source: selection.statistics.source(),
            fallback_reason: selection.fallback_reason.clone(),
            statistics_path: self.config.statistics_path.clone(),
            network_path: self.config.network_path.clone(),
            degenerate_fields: selection
                .statistics
                .degenerate_fields()
                .into_iter()
                .map(str::to_string)
                .collect(),
            selected_at: selection.selected_at,
        }
    }

    /// Normalise, dispatch to the active backend, and tier the probability
    pub fn score(&self, raw: &FeatureVector) -> Result<ScoreResult> {
        let started = Instant::now();
        let selection = self.selection();

        let normalized = selection.statistics.transform(raw).map_err(|e| {
            self.metrics.record_invalid();
            e
        })?;

        let probability = selection.predictor.score(&normalized);
        if !probability.is_finite() {
            self.metrics.record_invalid();
            return Err(FraudError::InvalidFeatureVector(format!(
                "{} backend produced a non-finite probability",
                selection.backend()
            )));
        }

        let result = ScoreResult::new(probability, selection.backend());
        let elapsed = started.elapsed();
        if elapsed.as_millis() > MAX_SCORING_LATENCY_MS {
            warn!(
                latency_ms = elapsed.as_millis() as u64,
                limit_ms = MAX_SCORING_LATENCY_MS as u64,
                "Scoring exceeded latency budget"
            );
        }
        self.metrics.record_score(&result, elapsed);

        debug!(
            probability = result.probability,
            tier = %result.risk_tier,
            backend = %result.backend,
            latency_us = elapsed.as_micros() as u64,
            "Scored transaction"
        );
        Ok(result)
    }

    /// Score a raw slice; wrong length or non-finite values are rejected
    pub fn score_values(&self, values: &[f64]) -> Result<ScoreResult> {
        let vector = FeatureVector::from_slice(values).map_err(|e| {
            self.metrics.record_invalid();
            e
        })?;
        self.score(&vector)
    }

    pub fn score_batch(&self, raws: &[FeatureVector]) -> Result<Vec<ScoreResult>> {
        raws.iter().map(|raw| self.score(raw)).collect()
    }

    /// Score, then queue the result for recording without waiting on storage
    pub fn score_and_record(
        &self,
        transaction_id: impl Into<String>,
        raw: &FeatureVector,
        recorder: &RecorderHandle,
    ) -> Result<ScoreResult> {
        let result = self.score(raw)?;
        recorder.submit(transaction_id, result)?;
        Ok(result)
    }
}

/// Run a loader, turning both errors and panics into a reason string
fn guarded<T>(what: &str, load: impl FnOnce() -> Result<T>) -> std::result::Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("{} loader panicked: {}", what, panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn select_backend(config: &ModelConfig) -> BackendSelection {
    let statistics = guarded("statistics", || {
        FittedStatistics::load(&config.statistics_path)
    });
    let network = guarded("network", || NeuralPredictor::load(&config.network_path));

    match (statistics, network) {
        (Ok(statistics), Ok(network)) => {
            info!(
                statistics = %config.statistics_path.display(),
                network = %config.network_path.display(),
                "🧠 Scoring backend: MODEL"
            );
            BackendSelection {
                predictor: Box::new(network),
                statistics: Arc::new(statistics),
                fallback_reason: None,
                selected_at: Utc::now(),
            }
        }
        (statistics, network) => {
            let mut reasons = Vec::new();
            if let Err(e) = &statistics {
                reasons.push(format!("statistics: {}", e));
            }
            if let Err(e) = &network {
                reasons.push(format!("network: {}", e));
            }
            let reason = reasons.join("; ");

            let statistics = Arc::new(statistics.unwrap_or_else(|_| FittedStatistics::identity()));
            warn!(
                reason = %reason,
                statistics_source = ?statistics.source(),
                "⚠️ Scoring backend: HEURISTIC (model artifacts unavailable)"
            );
            if statistics.source() == StatisticsSource::Identity {
                warn!("Normalising with identity statistics; heuristic accuracy is reduced");
            }

            BackendSelection {
                predictor: Box::new(HeuristicPredictor::new(Arc::clone(&statistics))),
                statistics,
                fallback_reason: Some(reason),
                selected_at: Utc::now(),
            }
        }
    }
}
