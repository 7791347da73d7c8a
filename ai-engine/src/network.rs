//! Fixed-topology feed-forward fraud classifier
//!
//! ```text
//! 30 → dense(64, ReLU, L2) → dropout(0.3) → dense(32, ReLU, L2) → dropout(0.3) → dense(1, sigmoid)
//! ```
//!
//! Dropout only exists during training (see `trainer`); inference is a plain
//! forward pass and the sigmoid output is the fraud probability as-is.

use crate::artifact::{self, ArtifactKind, MAX_PAYLOAD_BYTES};
use crate::model::TrainingConfig;
use crate::trainer::{Trainer, TrainingReport};
use bincode::Options;
use fraud_core::{FeatureVector, FraudError, Result, FEATURE_COUNT};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const INPUT_WIDTH: usize = FEATURE_COUNT;
pub const HIDDEN_1: usize = 64;
pub const HIDDEN_2: usize = 32;
pub const OUTPUT_WIDTH: usize = 1;

/// Weights and biases. Kernels are stored `(inputs, outputs)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParameters {
    pub w1: Array2<f64>,
    pub b1: Array1<f64>,
    pub w2: Array2<f64>,
    pub b2: Array1<f64>,
    pub w3: Array2<f64>,
    pub b3: Array1<f64>,
}

impl NetworkParameters {
    /// Glorot-uniform kernels, zero biases
    pub fn initialize<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            w1: glorot_uniform(rng, INPUT_WIDTH, HIDDEN_1),
            b1: Array1::zeros(HIDDEN_1),
            w2: glorot_uniform(rng, HIDDEN_1, HIDDEN_2),
            b2: Array1::zeros(HIDDEN_2),
            w3: glorot_uniform(rng, HIDDEN_2, OUTPUT_WIDTH),
            b3: Array1::zeros(OUTPUT_WIDTH),
        }
    }

    pub fn zeros() -> Self {
        Self {
            w1: Array2::zeros((INPUT_WIDTH, HIDDEN_1)),
            b1: Array1::zeros(HIDDEN_1),
            w2: Array2::zeros((HIDDEN_1, HIDDEN_2)),
            b2: Array1::zeros(HIDDEN_2),
            w3: Array2::zeros((HIDDEN_2, OUTPUT_WIDTH)),
            b3: Array1::zeros(OUTPUT_WIDTH),
        }
    }

    /// Check every tensor against the fixed topology and for finiteness
    pub fn validate(&self) -> std::result::Result<(), String> {
        let kernels = [
            ("w1", self.w1.dim(), (INPUT_WIDTH, HIDDEN_1)),
            ("w2", self.w2.dim(), (HIDDEN_1, HIDDEN_2)),
            ("w3", self.w3.dim(), (HIDDEN_2, OUTPUT_WIDTH)),
        ];
        for (name, found, expected) in kernels {
            if found != expected {
                return Err(format!("{} has shape {:?}, expected {:?}", name, found, expected));
            }
        }

        let biases = [
            ("b1", self.b1.len(), HIDDEN_1),
            ("b2", self.b2.len(), HIDDEN_2),
            ("b3", self.b3.len(), OUTPUT_WIDTH),
        ];
        for (name, found, expected) in biases {
            if found != expected {
                return Err(format!("{} has length {}, expected {}", name, found, expected));
            }
        }

        let all_finite = self.w1.iter().all(|v| v.is_finite())
            && self.b1.iter().all(|v| v.is_finite())
            && self.w2.iter().all(|v| v.is_finite())
            && self.b2.iter().all(|v| v.is_finite())
            && self.w3.iter().all(|v| v.is_finite())
            && self.b3.iter().all(|v| v.is_finite());
        if !all_finite {
            return Err("non-finite weight".to_string());
        }

        Ok(())
    }

    /// Sum of squared hidden-layer kernel weights (the L2-penalised terms)
    pub fn l2_norm_sq(&self) -> f64 {
        self.w1.iter().map(|w| w * w).sum::<f64>() + self.w2.iter().map(|w| w * w).sum::<f64>()
    }

    pub fn parameter_count(&self) -> usize {
        self.w1.len() + self.b1.len() + self.w2.len() + self.b2.len() + self.w3.len() + self.b3.len()
    }

    /// Inference-time forward pass for one row
    pub fn forward(&self, input: ArrayView1<f64>) -> f64 {
        let h1 = (input.dot(&self.w1) + &self.b1).mapv(relu);
        let h2 = (h1.dot(&self.w2) + &self.b2).mapv(relu);
        let logit = h2.dot(&self.w3)[0] + self.b3[0];
        sigmoid(logit)
    }
}

fn glorot_uniform<R: Rng + ?Sized>(rng: &mut R, fan_in: usize, fan_out: usize) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

pub(crate) fn relu(x: f64) -> f64 {
    x.max(0.0)
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_PAYLOAD_BYTES)
}

/// Trained-model backend. Parameters are read-only once constructed.
#[derive(Debug, Clone)]
pub struct NeuralPredictor {
    params: NetworkParameters,
}

impl NeuralPredictor {
    pub fn new(params: NetworkParameters) -> Result<Self> {
        params
            .validate()
            .map_err(|reason| anyhow::anyhow!("invalid network parameters: {}", reason))?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &NetworkParameters {
        &self.params
    }

    /// Fraud probability for an already-normalised vector
    pub fn score(&self, vector: &FeatureVector) -> f64 {
        self.params.forward(ArrayView1::from(&vector.values()[..]))
    }

    pub fn score_batch(&self, vectors: &[FeatureVector]) -> Vec<f64> {
        vectors.iter().map(|v| self.score(v)).collect()
    }

    /// Fit a fresh network. Rows must already be normalised; labels are 0/1.
    pub fn train(
        rows: &[FeatureVector],
        labels: &[u8],
        config: &TrainingConfig,
    ) -> Result<(Self, TrainingReport)> {
        let (params, report) = Trainer::new(config.clone()).train(rows, labels)?;
        Ok((Self { params }, report))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = bincode_options()
            .serialize(&self.params)
            .map_err(|e| FraudError::SerializationError(e.to_string()))?;
        artifact::write(path, ArtifactKind::Network, &bytes)?;

        info!(
            path = %path.display(),
            parameters = self.params.parameter_count(),
            "Saved network parameters"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = artifact::read(path, ArtifactKind::Network)?;
        let params: NetworkParameters = bincode_options()
            .deserialize(&bytes)
            .map_err(|e| FraudError::corrupt(path, format!("invalid network payload: {}", e)))?;
        params
            .validate()
            .map_err(|reason| FraudError::corrupt(path, reason))?;

        info!(
            path = %path.display(),
            parameters = params.parameter_count(),
            "Loaded network parameters"
        );
        Ok(Self { params })
    }
}
