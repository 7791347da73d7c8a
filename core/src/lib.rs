pub mod error;
pub mod feature_vector;
pub mod types;

pub use error::{FraudError, Result};
pub use feature_vector::{
    feature_index, FeatureVector, AMOUNT_INDEX, FEATURE_COUNT, FEATURE_NAMES, PCA_FEATURE_COUNT,
    TIME_INDEX,
};
pub use types::{
    Backend, RiskTier, ScoreResult, HIGH_RISK_CEILING, LOW_RISK_CEILING, MEDIUM_RISK_CEILING,
};
