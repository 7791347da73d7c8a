//! Mini-batch training for `NetworkParameters`
//!
//! Class-weighted binary cross-entropy + L2 on the hidden kernels, Adam,
//! inverted dropout, early stopping on validation loss (best weights are
//! restored) and learning-rate reduction on validation plateaus. A run is
//! bounded by both an epoch ceiling and a wall-clock ceiling.

use crate::model::TrainingConfig;
use crate::network::{relu, sigmoid, NetworkParameters};
use fraud_core::{FeatureVector, FraudError, Result, FEATURE_COUNT};
use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

const BCE_EPSILON: f64 = 1e-7;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Validation loss stopped improving for the patience window
    EarlyStopping,
    EpochCeiling,
    WallClock,
}

/// Loss weights inversely proportional to class frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub negative: f64,
    pub positive: f64,
}

impl ClassWeights {
    /// `w_c = total / (2 * count_c)`. Both classes must be present.
    pub fn from_labels(labels: &[u8]) -> Result<Self> {
        let positives = labels.iter().filter(|&&l| l == 1).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(FraudError::InsufficientData(format!(
                "training partition needs both classes ({} negative, {} positive)",
                negatives, positives
            )));
        }

        let total = labels.len() as f64;
        Ok(Self {
            negative: total / (2.0 * negatives as f64),
            positive: total / (2.0 * positives as f64),
        })
    }

    pub fn for_label(&self, label: u8) -> f64 {
        if label == 1 {
            self.positive
        } else {
            self.negative
        }
    }

    pub fn ratio(&self) -> f64 {
        self.positive / self.negative
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub final_learning_rate: f64,
    pub class_weights: ClassWeights,
    pub stop_reason: StopReason,
    pub training_rows: usize,
    pub validation_rows: usize,
    pub elapsed_ms: u64,
    pub history: Vec<EpochMetrics>,
}

struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }
}

/// Adaptive-moment optimiser state for every tensor of the network
struct Adam {
    learning_rate: f64,
    t: i32,
    w1: Moments<ndarray::Ix2>,
    b1: Moments<ndarray::Ix1>,
    w2: Moments<ndarray::Ix2>,
    b2: Moments<ndarray::Ix1>,
    w3: Moments<ndarray::Ix2>,
    b3: Moments<ndarray::Ix1>,
}

impl Adam {
    fn new(learning_rate: f64, params: &NetworkParameters) -> Self {
        Self {
            learning_rate,
            t: 0,
            w1: Moments::zeros_like(&params.w1),
            b1: Moments::zeros_like(&params.b1),
            w2: Moments::zeros_like(&params.w2),
            b2: Moments::zeros_like(&params.b2),
            w3: Moments::zeros_like(&params.w3),
            b3: Moments::zeros_like(&params.b3),
        }
    }

    fn step(&mut self, params: &mut NetworkParameters, grads: &Gradients) {
        self.t += 1;
        let lr = self.learning_rate;
        let t = self.t;
        update(&mut params.w1, &grads.w1, &mut self.w1, lr, t);
        update(&mut params.b1, &grads.b1, &mut self.b1, lr, t);
        update(&mut params.w2, &grads.w2, &mut self.w2, lr, t);
        update(&mut params.b2, &grads.b2, &mut self.b2, lr, t);
        update(&mut params.w3, &grads.w3, &mut self.w3, lr, t);
        update(&mut params.b3, &grads.b3, &mut self.b3, lr, t);
    }
}

fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    moments: &mut Moments<D>,
    lr: f64,
    t: i32,
) {
    let bias1 = 1.0 - ADAM_BETA1.powi(t);
    let bias2 = 1.0 - ADAM_BETA2.powi(t);
    Zip::from(param)
        .and(grad)
        .and(&mut moments.m)
        .and(&mut moments.v)
        .for_each(|p, &g, m, v| {
            *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
            *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
        });
}

struct Gradients {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
    w3: Array2<f64>,
    b3: Array1<f64>,
}

fn binary_cross_entropy(p: f64, y: f64) -> f64 {
    let p = p.clamp(BCE_EPSILON, 1.0 - BCE_EPSILON);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

fn relu_grad(z: &Array2<f64>) -> Array2<f64> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn validate_config(&self) -> Result<()> {
        let c = &self.config;
        if c.batch_size == 0 || c.max_epochs == 0 {
            return Err(FraudError::ConfigError(
                "batch_size and max_epochs must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&c.dropout_rate) {
            return Err(FraudError::ConfigError(format!(
                "dropout_rate {} outside [0, 1)",
                c.dropout_rate
            )));
        }
        if !(c.validation_split > 0.0 && c.validation_split < 1.0) {
            return Err(FraudError::ConfigError(format!(
                "validation_split {} outside (0, 1)",
                c.validation_split
            )));
        }
        if !(c.learning_rate > 0.0) || !c.learning_rate.is_finite() {
            return Err(FraudError::ConfigError(format!(
                "learning_rate {} must be positive",
                c.learning_rate
            )));
        }
        Ok(())
    }

    /// Train from normalised rows and 0/1 labels. Returns the best-validation
    /// parameters seen during the run.
    pub fn train(
        &self,
        rows: &[FeatureVector],
        labels: &[u8],
    ) -> Result<(NetworkParameters, TrainingReport)> {
        self.validate_config()?;
        let c = &self.config;

        if rows.len() != labels.len() {
            return Err(FraudError::InvalidFeatureVector(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l > 1) {
            return Err(FraudError::InvalidFeatureVector(format!(
                "label {} is not 0 or 1",
                bad
            )));
        }
        if rows.len() < 2 {
            return Err(FraudError::InsufficientData(format!(
                "need at least 2 rows to train, got {}",
                rows.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(c.seed);
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.shuffle(&mut rng);

        let val_count = ((rows.len() as f64 * c.validation_split).round() as usize).max(1);
        if val_count >= rows.len() {
            return Err(FraudError::InsufficientData(format!(
                "{} rows leave nothing to train on after holding out {} for validation",
                rows.len(),
                val_count
            )));
        }
        let (train_idx, val_idx) = order.split_at(rows.len() - val_count);

        let train_labels: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();
        let class_weights = ClassWeights::from_labels(&train_labels)?;

        let x_train = to_matrix(rows, train_idx);
        let y_train: Array1<f64> = train_idx.iter().map(|&i| labels[i] as f64).collect();
        let w_train: Array1<f64> = train_idx
            .iter()
            .map(|&i| class_weights.for_label(labels[i]))
            .collect();
        let x_val = to_matrix(rows, val_idx);
        let y_val: Array1<f64> = val_idx.iter().map(|&i| labels[i] as f64).collect();

        info!(
            training_rows = train_idx.len(),
            validation_rows = val_idx.len(),
            negative_weight = class_weights.negative,
            positive_weight = class_weights.positive,
            "Starting training"
        );

        let mut params = NetworkParameters::initialize(&mut rng);
        let mut adam = Adam::new(c.learning_rate, &params);

        let started = Instant::now();
        let mut history = Vec::with_capacity(c.max_epochs.min(1024));
        let mut best_params = params.clone();
        let mut best_val_loss = f64::INFINITY;
        let mut best_epoch = 0;
        let mut epochs_without_improvement = 0;
        let mut plateau_best = f64::INFINITY;
        let mut plateau_wait = 0;
        let mut stop_reason = StopReason::EpochCeiling;

        let mut batch_order: Vec<usize> = (0..train_idx.len()).collect();

        for epoch in 1..=c.max_epochs {
            batch_order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            for (batch_no, batch) in batch_order.chunks(c.batch_size).enumerate() {
                let x = x_train.select(Axis(0), batch);
                let y = y_train.select(Axis(0), batch);
                let w = w_train.select(Axis(0), batch);

                let (loss, grads) = self.batch_step(&params, &x, &y, &w, &mut rng);
                if !loss.is_finite() {
                    warn!(epoch, batch = batch_no + 1, loss, "Training loss became non-finite");
                    return Err(FraudError::TrainingDiverged {
                        epoch,
                        batch: batch_no + 1,
                        loss,
                    });
                }
                loss_sum += loss * batch.len() as f64;
                adam.step(&mut params, &grads);
            }

            let train_loss = loss_sum / train_idx.len() as f64;
            let val_loss = validation_loss(&params, &x_val, &y_val, c.l2_penalty);
            if !val_loss.is_finite() {
                warn!(epoch, val_loss, "Validation loss became non-finite");
                return Err(FraudError::TrainingDiverged {
                    epoch,
                    batch: 0,
                    loss: val_loss,
                });
            }

            history.push(EpochMetrics {
                epoch,
                train_loss,
                val_loss,
                learning_rate: adam.learning_rate,
            });
            info!(
                epoch,
                train_loss,
                val_loss,
                learning_rate = adam.learning_rate,
                "Epoch complete"
            );

            if val_loss < best_val_loss {
                best_val_loss = val_loss;
                best_params = params.clone();
                best_epoch = epoch;
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
            }

            if val_loss < plateau_best - c.lr_plateau_min_delta {
                plateau_best = val_loss;
                plateau_wait = 0;
            } else {
                plateau_wait += 1;
                if plateau_wait >= c.lr_plateau_patience {
                    let reduced = (adam.learning_rate * c.lr_plateau_factor).max(c.min_learning_rate);
                    if reduced < adam.learning_rate {
                        info!(
                            epoch,
                            from = adam.learning_rate,
                            to = reduced,
                            "Reducing learning rate on plateau"
                        );
                        adam.learning_rate = reduced;
                    }
                    plateau_wait = 0;
                }
            }

            if epochs_without_improvement >= c.early_stopping_patience {
                stop_reason = StopReason::EarlyStopping;
                break;
            }
            if started.elapsed() >= c.time_limit() {
                warn!(epoch, limit_secs = c.max_training_secs, "Training hit wall-clock ceiling");
                stop_reason = StopReason::WallClock;
                break;
            }
        }

        let report = TrainingReport {
            epochs_run: history.len(),
            best_epoch,
            best_val_loss,
            final_learning_rate: adam.learning_rate,
            class_weights,
            stop_reason,
            training_rows: train_idx.len(),
            validation_rows: val_idx.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            history,
        };

        info!(
            epochs = report.epochs_run,
            best_epoch = report.best_epoch,
            best_val_loss = report.best_val_loss,
            stop_reason = ?report.stop_reason,
            "Training finished, restoring best weights"
        );

        Ok((best_params, report))
    }

    /// Forward with dropout, weighted loss, and gradients for one mini-batch
    fn batch_step(
        &self,
        params: &NetworkParameters,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weights: &Array1<f64>,
        rng: &mut StdRng,
    ) -> (f64, Gradients) {
        let l2 = self.config.l2_penalty;
        let rate = self.config.dropout_rate;
        let keep_scale = 1.0 / (1.0 - rate);
        let batch = x.nrows() as f64;

        let mut dropout_mask = |shape: (usize, usize)| {
            Array2::from_shape_fn(shape, |_| {
                if rng.gen::<f64>() < rate {
                    0.0
                } else {
                    keep_scale
                }
            })
        };

        let z1 = x.dot(&params.w1) + &params.b1;
        let mask1 = dropout_mask(z1.dim());
        let a1 = z1.mapv(relu) * &mask1;

        let z2 = a1.dot(&params.w2) + &params.b2;
        let mask2 = dropout_mask(z2.dim());
        let a2 = z2.mapv(relu) * &mask2;

        let z3 = a2.dot(&params.w3) + &params.b3;
        let p = z3.column(0).mapv(sigmoid);

        let data_loss = Zip::from(&p)
            .and(y)
            .and(sample_weights)
            .fold(0.0, |acc, &p, &y, &w| acc + w * binary_cross_entropy(p, y))
            / batch;
        let loss = data_loss + l2 * params.l2_norm_sq();

        // d(loss)/d(logit) for sigmoid + BCE is (p - y), scaled by sample weight
        let dz3 = ((&p - y) * sample_weights / batch).insert_axis(Axis(1));
        let dw3 = a2.t().dot(&dz3);
        let db3 = dz3.sum_axis(Axis(0));

        let dz2 = dz3.dot(&params.w3.t()) * &mask2 * relu_grad(&z2);
        let dw2 = a1.t().dot(&dz2) + &params.w2 * (2.0 * l2);
        let db2 = dz2.sum_axis(Axis(0));

        let dz1 = dz2.dot(&params.w2.t()) * &mask1 * relu_grad(&z1);
        let dw1 = x.t().dot(&dz1) + &params.w1 * (2.0 * l2);
        let db1 = dz1.sum_axis(Axis(0));

        debug!(loss, batch_rows = x.nrows(), "Batch step");

        (
            loss,
            Gradients {
                w1: dw1,
                b1: db1,
                w2: dw2,
                b2: db2,
                w3: dw3,
                b3: db3,
            },
        )
    }
}

fn to_matrix(rows: &[FeatureVector], indices: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((indices.len(), FEATURE_COUNT), |(i, j)| {
        rows[indices[i]].values()[j]
    })
}

/// Unweighted BCE plus the L2 term, dropout disabled
fn validation_loss(params: &NetworkParameters, x: &Array2<f64>, y: &Array1<f64>, l2: f64) -> f64 {
    let h1 = (x.dot(&params.w1) + &params.b1).mapv(relu);
    let h2 = (h1.dot(&params.w2) + &params.b2).mapv(relu);
    let p = (h2.dot(&params.w3) + &params.b3).column(0).mapv(sigmoid);

    let data_loss = Zip::from(&p)
        .and(y)
        .fold(0.0, |acc, &p, &y| acc + binary_cross_entropy(p, y))
        / x.nrows() as f64;
    data_loss + l2 * params.l2_norm_sq()
}
