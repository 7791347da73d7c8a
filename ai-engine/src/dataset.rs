//! Labelled transaction data for fitting and training
//!
//! The reference CSV carries `Time, V1..V28, Amount, Class`; columns are
//! located by header name so extra columns and reordering are tolerated.

use fraud_core::{FeatureVector, FraudError, Result, FEATURE_COUNT, FEATURE_NAMES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub const LABEL_COLUMN: &str = "Class";

/// Legitimate rows kept per fraudulent row when undersampling
const UNDERSAMPLE_RATIO: usize = 2;
/// Legitimate rows per synthetic fraudulent row when oversampling
const OVERSAMPLE_DIVISOR: usize = 100;

/// How to rebalance the classes before splitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMethod {
    /// Keep every row
    None,
    /// Sample legitimate rows without replacement down to 2 per fraud row
    #[default]
    Undersample,
    /// Resample fraud rows with replacement up to 1 per 100 legitimate rows
    Oversample,
}

impl fmt::Display for BalanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BalanceMethod::None => "none",
            BalanceMethod::Undersample => "undersample",
            BalanceMethod::Oversample => "oversample",
        };
        f.write_str(name)
    }
}

impl FromStr for BalanceMethod {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(BalanceMethod::None),
            "undersample" => Ok(BalanceMethod::Undersample),
            "oversample" => Ok(BalanceMethod::Oversample),
            other => Err(FraudError::ConfigError(format!(
                "unknown balance method '{}' (expected none, undersample or oversample)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    rows: Vec<FeatureVector>,
    labels: Vec<u8>,
}

impl LabeledDataset {
    pub fn new(rows: Vec<FeatureVector>, labels: Vec<u8>) -> Result<Self> {
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
        Ok(Self { rows, labels })
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let dataset = Self::from_csv_reader(file)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            positive_rate = dataset.positive_rate(),
            "Loaded labelled dataset"
        );
        Ok(dataset)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers().map_err(csv_error)?.clone();

        let column = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                FraudError::InvalidFeatureVector(format!("missing column '{}'", name))
            })
        };
        let mut feature_columns = [0usize; FEATURE_COUNT];
        for (slot, name) in feature_columns.iter_mut().zip(FEATURE_NAMES.iter()) {
            *slot = column(name)?;
        }
        let label_column = column(LABEL_COLUMN)?;

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let field = |idx: usize| -> Result<f64> {
                let raw = record.get(idx).unwrap_or_default();
                raw.parse::<f64>().map_err(|_| {
                    FraudError::InvalidFeatureVector(format!(
                        "row {}: '{}' is not a number",
                        line + 1,
                        raw
                    ))
                })
            };

            let mut values = [0.0; FEATURE_COUNT];
            for (value, &idx) in values.iter_mut().zip(feature_columns.iter()) {
                *value = field(idx)?;
            }
            let label = match field(label_column)? {
                l if l == 0.0 => 0,
                l if l == 1.0 => 1,
                other => {
                    return Err(FraudError::InvalidFeatureVector(format!(
                        "row {}: label {} is not 0 or 1",
                        line + 1,
                        other
                    )))
                }
            };

            rows.push(FeatureVector::from_values(values)?);
            labels.push(label);
        }

        Ok(Self { rows, labels })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Share of fraudulent rows (0.0 for an empty dataset)
    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.positive_count() as f64 / self.labels.len() as f64
        }
    }

    /// `(train, test)` with each class split in the same proportion
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(FraudError::ConfigError(format!(
                "test fraction {} outside (0, 1)",
                test_fraction
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for class in [0u8, 1u8] {
            let mut idx: Vec<usize> = (0..self.labels.len())
                .filter(|&i| self.labels[i] == class)
                .collect();
            idx.shuffle(&mut rng);
            let test_count = (idx.len() as f64 * test_fraction).round() as usize;
            test_idx.extend_from_slice(&idx[..test_count]);
            train_idx.extend_from_slice(&idx[test_count..]);
        }
        train_idx.shuffle(&mut rng);
        test_idx.shuffle(&mut rng);

        Ok((self.subset(&train_idx), self.subset(&test_idx)))
    }

    /// Rebalance the classes, then shuffle. Seeded, so the same input and
    /// seed always give the same rows in the same order.
    ///
    /// Oversampling never shrinks the fraud class: the target is
    /// `max(legitimate / 100, fraud)`.
    pub fn balance(&self, method: BalanceMethod, seed: u64) -> Result<Self> {
        if method == BalanceMethod::None {
            return Ok(self.clone());
        }

        let mut negatives: Vec<usize> = (0..self.labels.len())
            .filter(|&i| self.labels[i] == 0)
            .collect();
        let positives: Vec<usize> = (0..self.labels.len())
            .filter(|&i| self.labels[i] == 1)
            .collect();
        if negatives.is_empty() || positives.is_empty() {
            return Err(FraudError::InsufficientData(format!(
                "cannot {} with {} legitimate and {} fraudulent rows",
                method,
                negatives.len(),
                positives.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices = if method == BalanceMethod::Undersample {
            let keep = (positives.len() * UNDERSAMPLE_RATIO).min(negatives.len());
            negatives.shuffle(&mut rng);
            negatives.truncate(keep);
            negatives.extend_from_slice(&positives);
            negatives
        } else {
            let target = (negatives.len() / OVERSAMPLE_DIVISOR).max(positives.len());
            negatives.extend((0..target).map(|_| positives[rng.gen_range(0..positives.len())]));
            negatives
        };
        indices.shuffle(&mut rng);

        let balanced = self.subset(&indices);
        info!(
            method = %method,
            legitimate_before = self.len() - self.positive_count(),
            fraud_before = self.positive_count(),
            legitimate_after = balanced.len() - balanced.positive_count(),
            fraud_after = balanced.positive_count(),
            "Rebalanced classes"
        );
        Ok(balanced)
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn into_parts(self) -> (Vec<FeatureVector>, Vec<u8>) {
        (self.rows, self.labels)
    }
}

fn csv_error(e: csv::Error) -> FraudError {
    FraudError::SerializationError(format!("csv: {}", e))
}
