use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Locations of the two fitted artifacts the engine looks for at startup.
/// Either may be absent; absence selects the heuristic backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub statistics_path: PathBuf,
    pub network_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            statistics_path: PathBuf::from("models/scaler.stats"),
            network_path: PathBuf::from("models/fraud_detection_model.net"),
        }
    }
}

impl ModelConfig {
    pub fn new(statistics_path: impl Into<PathBuf>, network_path: impl Into<PathBuf>) -> Self {
        Self {
            statistics_path: statistics_path.into(),
            network_path: network_path.into(),
        }
    }

    pub fn with_statistics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.statistics_path = path.into();
        self
    }

    pub fn with_network_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.network_path = path.into();
        self
    }
}

/// Hyperparameters for `Trainer`. Defaults reproduce the reference training run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Hard epoch ceiling
    pub max_epochs: usize,
    pub batch_size: usize,
    /// Base Adam learning rate
    pub learning_rate: f64,
    /// L2 weight penalty on both hidden kernels
    pub l2_penalty: f64,
    /// Dropout rate after each hidden layer (training only)
    pub dropout_rate: f64,
    /// Epochs without validation improvement before stopping
    pub early_stopping_patience: usize,
    pub lr_plateau_factor: f64,
    pub lr_plateau_patience: usize,
    pub lr_plateau_min_delta: f64,
    pub min_learning_rate: f64,
    /// Fraction of the training rows held out for validation loss
    pub validation_split: f64,
    /// Fraction of the dataset held out for final evaluation (CLI only)
    pub test_split: f64,
    pub seed: u64,
    /// Wall-clock ceiling for one training run
    pub max_training_secs: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 50,
            batch_size: 256,
            learning_rate: 0.001,
            l2_penalty: 0.001,
            dropout_rate: 0.3,
            early_stopping_patience: 10,
            lr_plateau_factor: 0.5,
            lr_plateau_patience: 5,
            lr_plateau_min_delta: 1e-4,
            min_learning_rate: 1e-7,
            validation_split: 0.2,
            test_split: 0.2,
            seed: 42,
            max_training_secs: 600,
        }
    }
}

impl TrainingConfig {
    pub fn with_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_l2_penalty(mut self, l2_penalty: f64) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    pub fn with_patience(mut self, early_stopping_patience: usize) -> Self {
        self.early_stopping_patience = early_stopping_patience;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.max_training_secs = limit.as_secs();
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.max_training_secs)
    }
}
