pub mod artifact;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod evaluation;
pub mod heuristic;
pub mod metrics;
pub mod model;
pub mod network;
pub mod predictor;
pub mod preprocessing;
pub mod recorder;
pub mod telemetry;
pub mod trainer;

pub use config::{AppConfig, LoggingConfig, RecorderConfig};
pub use dataset::{BalanceMethod, LabeledDataset};
pub use engine::{BackendSelection, EngineStatus, ScoringEngine};
pub use evaluation::{evaluate, ConfusionMatrix, EvaluationReport};
pub use heuristic::{HeuristicBreakdown, HeuristicPredictor};
pub use metrics::ScoringMetrics;
pub use model::{ModelConfig, TrainingConfig};
pub use network::{NetworkParameters, NeuralPredictor};
pub use predictor::Predictor;
pub use preprocessing::{FittedStatistics, Preprocessor, StatisticsSource};
pub use recorder::{
    InMemoryRecorder, JsonlRecorder, PredictionRecord, PredictionRecorder, RecorderHandle,
};
pub use trainer::{ClassWeights, EpochMetrics, StopReason, Trainer, TrainingReport};

// Shared vocabulary from the core crate
pub use fraud_core::{
    Backend, FeatureVector, FraudError, Result, RiskTier, ScoreResult, FEATURE_COUNT, FEATURE_NAMES,
};
