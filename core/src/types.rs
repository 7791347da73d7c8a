use serde::{Deserialize, Serialize};
use std::fmt;

// Tier boundaries are exclusive upper bounds.
pub const LOW_RISK_CEILING: f64 = 0.3;
pub const MEDIUM_RISK_CEILING: f64 = 0.6;
pub const HIGH_RISK_CEILING: f64 = 0.85;

/// Discrete risk bucket derived from a fraud probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_probability(probability: f64) -> Self {
        if probability < LOW_RISK_CEILING {
            RiskTier::Low
        } else if probability < MEDIUM_RISK_CEILING {
            RiskTier::Medium
        } else if probability < HIGH_RISK_CEILING {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }

    pub fn is_elevated(&self) -> bool {
        matches!(self, RiskTier::High | RiskTier::Critical)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring strategy that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Backend {
    /// Trained feed-forward network
    Model,
    /// Deterministic weighted-rule fallback
    Heuristic,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Model => "MODEL",
            Backend::Heuristic => "HEURISTIC",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one scoring call (0.0 = legitimate, 1.0 = fraud)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub probability: f64,
    pub risk_tier: RiskTier,
    pub backend: Backend,
}

impl ScoreResult {
    pub fn new(probability: f64, backend: Backend) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            probability,
            risk_tier: RiskTier::from_probability(probability),
            backend,
        }
    }

    pub fn is_fraud(&self, threshold: f64) -> bool {
        self.probability > threshold
    }

    /// Distance from the decision boundary, as reported to analysts
    pub fn confidence(&self) -> f64 {
        self.probability.max(1.0 - self.probability)
    }
}
