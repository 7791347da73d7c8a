//! Fixed 30-field transaction representation
//!
//! Field order follows the reference dataset columns and must never change:
//! `Time`, `V1` .. `V28`, `Amount`. Statistics, network weights and heuristic
//! rules all index into this layout.

use crate::error::{FraudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FEATURE_COUNT: usize = 30;
pub const PCA_FEATURE_COUNT: usize = 28;

pub const TIME_INDEX: usize = 0;
pub const AMOUNT_INDEX: usize = 29;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Time", "V1", "V2", "V3", "V4", "V5", "V6", "V7", "V8", "V9", "V10", "V11", "V12", "V13",
    "V14", "V15", "V16", "V17", "V18", "V19", "V20", "V21", "V22", "V23", "V24", "V25", "V26",
    "V27", "V28", "Amount",
];

/// Ordered, finite 30-dimensional feature record.
///
/// Construction always validates, so any `FeatureVector` in hand is well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// All fields at zero (the exact mean once normalized)
    pub fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Result<Self> {
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(FraudError::InvalidFeatureVector(format!(
                "non-finite value {} in field {}",
                values[idx], FEATURE_NAMES[idx]
            )));
        }
        Ok(Self(values))
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let array: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
            FraudError::InvalidFeatureVector(format!(
                "expected {} fields, got {}",
                FEATURE_COUNT,
                values.len()
            ))
        })?;
        Self::from_values(array)
    }

    /// Build from column name → value pairs. All 30 names are required and
    /// unknown names are rejected rather than ignored.
    pub fn from_named(fields: &HashMap<String, f64>) -> Result<Self> {
        if let Some(unknown) = fields.keys().find(|k| feature_index(k).is_none()) {
            return Err(FraudError::InvalidFeatureVector(format!(
                "unknown field '{}'",
                unknown
            )));
        }

        let mut values = [0.0; FEATURE_COUNT];
        for (idx, name) in FEATURE_NAMES.iter().enumerate() {
            values[idx] = *fields.get(*name).ok_or_else(|| {
                FraudError::InvalidFeatureVector(format!("missing field '{}'", name))
            })?;
        }
        Self::from_values(values)
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|idx| self.0[idx])
    }

    pub fn time(&self) -> f64 {
        self.0[TIME_INDEX]
    }

    pub fn amount(&self) -> f64 {
        self.0[AMOUNT_INDEX]
    }

    /// PCA component `V{n}` for n in 1..=28
    pub fn pca(&self, n: usize) -> Option<f64> {
        (1..=PCA_FEATURE_COUNT).contains(&n).then(|| self.0[n])
    }

    pub fn pca_components(&self) -> &[f64] {
        &self.0[1..=PCA_FEATURE_COUNT]
    }

    pub fn iter_named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }

    pub fn to_named(&self) -> HashMap<String, f64> {
        self.iter_named()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    pub const fn feature_count() -> usize {
        FEATURE_COUNT
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = FraudError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::from_slice(&values)
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(vector: FeatureVector) -> Self {
        vector.0.to_vec()
    }
}

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(FEATURE_NAMES[TIME_INDEX], "Time");
        assert_eq!(FEATURE_NAMES[AMOUNT_INDEX], "Amount");
        assert_eq!(FEATURE_NAMES[14], "V14");
        assert_eq!(feature_index("V28"), Some(28));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = FeatureVector::from_slice(&[0.0; 29]).unwrap_err();
        assert!(err.to_string().contains("expected 30 fields, got 29"));
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut values = [0.0; FEATURE_COUNT];
        values[AMOUNT_INDEX] = f64::NAN;
        let err = FeatureVector::from_values(values).unwrap_err();
        assert!(matches!(err, FraudError::InvalidFeatureVector(_)));
        assert!(err.to_string().contains("Amount"));

        values[AMOUNT_INDEX] = f64::INFINITY;
        assert!(FeatureVector::from_values(values).is_err());
    }

    #[test]
    fn test_from_named_requires_every_field() {
        let mut fields = FeatureVector::zeros().to_named();
        fields.insert("Amount".to_string(), 149.62);
        let vector = FeatureVector::from_named(&fields).unwrap();
        assert_eq!(vector.amount(), 149.62);

        fields.remove("V7");
        let err = FeatureVector::from_named(&fields).unwrap_err();
        assert!(err.to_string().contains("missing field 'V7'"));
    }

    #[test]
    fn test_from_named_rejects_unknown_field() {
        let mut fields = FeatureVector::zeros().to_named();
        fields.insert("V29".to_string(), 1.0);
        assert!(FeatureVector::from_named(&fields).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: FeatureVector = serde_json::from_str(&format!("{:?}", vec![1.0; 30])).unwrap();
        assert_eq!(ok.time(), 1.0);

        let short = serde_json::from_str::<FeatureVector>("[1.0, 2.0]");
        assert!(short.is_err());
    }

    #[test]
    fn test_pca_accessor_bounds() {
        let vector = FeatureVector::zeros();
        assert_eq!(vector.pca(1), Some(0.0));
        assert_eq!(vector.pca(0), None);
        assert_eq!(vector.pca(29), None);
        assert_eq!(vector.pca_components().len(), PCA_FEATURE_COUNT);
    }
}
