//! Prometheus instrumentation for the scoring path
//!
//! Each engine owns its own `Registry` so several engines (tests, side-by-side
//! evaluation) never collide on metric names.

use fraud_core::{Backend, FraudError, Result, RiskTier, ScoreResult};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

const LATENCY_BUCKETS_SECS: [f64; 10] = [
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05,
];

fn metrics_error(e: prometheus::Error) -> FraudError {
    FraudError::MetricsError(e.to_string())
}

pub struct ScoringMetrics {
    registry: Registry,
    scores_total: IntCounterVec,
    scoring_latency: Histogram,
    invalid_inputs: IntCounter,
    active_backend: IntGaugeVec,
}

impl ScoringMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("fraud".to_string()), None).map_err(metrics_error)?;

        let scores_total = IntCounterVec::new(
            Opts::new("scores_total", "Scores produced, by backend and risk tier"),
            &["backend", "tier"],
        )
        .map_err(metrics_error)?;
        let scoring_latency = Histogram::with_opts(
            HistogramOpts::new("scoring_latency_seconds", "End-to-end scoring latency")
                .buckets(LATENCY_BUCKETS_SECS.to_vec()),
        )
        .map_err(metrics_error)?;
        let invalid_inputs = IntCounter::new(
            "invalid_inputs_total",
            "Feature vectors rejected before scoring",
        )
        .map_err(metrics_error)?;
        let active_backend = IntGaugeVec::new(
            Opts::new("active_backend", "1 for the backend selected at startup"),
            &["backend"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(scores_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(scoring_latency.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(invalid_inputs.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(active_backend.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            scores_total,
            scoring_latency,
            invalid_inputs,
            active_backend,
        })
    }

    pub fn record_score(&self, result: &ScoreResult, elapsed: Duration) {
        self.scores_total
            .with_label_values(&[result.backend.as_str(), result.risk_tier.as_str()])
            .inc();
        self.scoring_latency.observe(elapsed.as_secs_f64());
    }

    pub fn record_invalid(&self) {
        self.invalid_inputs.inc();
    }

    pub fn set_backend(&self, backend: Backend) {
        for candidate in [Backend::Model, Backend::Heuristic] {
            let value = i64::from(candidate == backend);
            self.active_backend
                .with_label_values(&[candidate.as_str()])
                .set(value);
        }
    }

    pub fn scores_for(&self, backend: Backend, tier: RiskTier) -> u64 {
        self.scores_total
            .with_label_values(&[backend.as_str(), tier.as_str()])
            .get()
    }

    pub fn total_scores(&self) -> u64 {
        self.scoring_latency.get_sample_count()
    }

    pub fn invalid_inputs(&self) -> u64 {
        self.invalid_inputs.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| FraudError::MetricsError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_backend_and_tier() {
        let metrics = ScoringMetrics::new().unwrap();
        let result = ScoreResult::new(0.9, Backend::Model);
        metrics.record_score(&result, Duration::from_micros(200));
        metrics.record_score(&result, Duration::from_micros(300));

        assert_eq!(metrics.scores_for(Backend::Model, RiskTier::Critical), 2);
        assert_eq!(metrics.scores_for(Backend::Heuristic, RiskTier::Critical), 0);
        assert_eq!(metrics.total_scores(), 2);
    }

    #[test]
    fn test_text_exposition() {
        let metrics = ScoringMetrics::new().unwrap();
        metrics.set_backend(Backend::Heuristic);
        metrics.record_invalid();

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("fraud_invalid_inputs_total 1"));
        assert!(text.contains("fraud_active_backend{backend=\"HEURISTIC\"} 1"));
        assert!(text.contains("fraud_active_backend{backend=\"MODEL\"} 0"));
    }
}
