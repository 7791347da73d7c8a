use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FraudError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Artifact missing: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Artifact corrupt: {} ({reason})", path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Training diverged at epoch {epoch}, batch {batch}: loss = {loss}")]
    TrainingDiverged { epoch: usize, batch: usize, loss: f64 },

    #[error("Invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Recorder error: {0}")]
    RecorderError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FraudError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FraudError::ArtifactCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Missing or corrupt artifacts. The scoring engine absorbs these into a
    /// heuristic fallback instead of surfacing them.
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            FraudError::ArtifactMissing { .. } | FraudError::ArtifactCorrupt { .. }
        )
    }
}

impl From<serde_json::Error> for FraudError {
    fn from(e: serde_json::Error) -> Self {
        FraudError::SerializationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FraudError>;
