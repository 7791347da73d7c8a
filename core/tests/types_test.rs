//! Fraud Core Types Tests
//! Tests risk tiers, score results, backends and feature vectors

use fraud_core::{Backend, FeatureVector, FraudError, RiskTier, ScoreResult, FEATURE_COUNT};

/// Test: Tier boundaries are exact
#[test]
fn test_risk_tier_boundaries() {
    assert_eq!(RiskTier::from_probability(0.29999), RiskTier::Low);
    assert_eq!(RiskTier::from_probability(0.3), RiskTier::Medium);
    assert_eq!(RiskTier::from_probability(0.59999), RiskTier::Medium);
    assert_eq!(RiskTier::from_probability(0.6), RiskTier::High);
    assert_eq!(RiskTier::from_probability(0.84999), RiskTier::High);
    assert_eq!(RiskTier::from_probability(0.85), RiskTier::Critical);
}

/// Test: Probability extremes
#[test]
fn test_risk_tier_extremes() {
    assert_eq!(RiskTier::from_probability(0.0), RiskTier::Low);
    assert_eq!(RiskTier::from_probability(1.0), RiskTier::Critical);
}

/// Test: Score result derives its tier
#[test]
fn test_score_result_tier() {
    let result = ScoreResult::new(0.7, Backend::Heuristic);

    assert_eq!(result.risk_tier, RiskTier::High);
    assert_eq!(result.backend, Backend::Heuristic);
    assert!(result.risk_tier.is_elevated());
}

/// Test: Score result clamps out-of-range probabilities
#[test]
fn test_score_result_clamp() {
    let high = ScoreResult::new(1.5, Backend::Model);
    let low = ScoreResult::new(-0.5, Backend::Model);

    assert_eq!(high.probability, 1.0, "Probability should be clamped to 1.0");
    assert_eq!(low.probability, 0.0, "Probability should be clamped to 0.0");
}

/// Test: Confidence is symmetric around 0.5
#[test]
fn test_score_result_confidence() {
    let result = ScoreResult::new(0.2, Backend::Model);

    assert!((result.confidence() - 0.8).abs() < 1e-12);
    assert!(!result.is_fraud(0.5));
    assert!(ScoreResult::new(0.51, Backend::Model).is_fraud(0.5));
}

/// Test: Wire format uses upper-case enum names
#[test]
fn test_score_result_serialization() {
    let result = ScoreResult::new(0.9, Backend::Model);

    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"CRITICAL\""));
    assert!(json.contains("\"MODEL\""));

    let decoded: ScoreResult = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, result);
}

/// Test: Display strings
#[test]
fn test_display() {
    assert_eq!(Backend::Heuristic.to_string(), "HEURISTIC");
    assert_eq!(RiskTier::Medium.to_string(), "MEDIUM");
}

/// Test: Malformed vectors fail fast
#[test]
fn test_feature_vector_validation() {
    assert!(FeatureVector::from_slice(&[0.0; FEATURE_COUNT]).is_ok());

    let too_long = vec![0.0; FEATURE_COUNT + 1];
    assert!(matches!(
        FeatureVector::from_slice(&too_long),
        Err(FraudError::InvalidFeatureVector(_))
    ));

    let mut with_nan = vec![0.0; FEATURE_COUNT];
    with_nan[5] = f64::NAN;
    assert!(matches!(
        FeatureVector::from_slice(&with_nan),
        Err(FraudError::InvalidFeatureVector(_))
    ));
}

/// Test: Named accessors follow the dataset column order
#[test]
fn test_feature_vector_accessors() {
    let mut values = [0.0; FEATURE_COUNT];
    values[0] = 3600.0;
    values[3] = -2.5;
    values[29] = 250.0;
    let vector = FeatureVector::from_values(values).unwrap();

    assert_eq!(vector.time(), 3600.0);
    assert_eq!(vector.amount(), 250.0);
    assert_eq!(vector.pca(3), Some(-2.5));
    assert_eq!(vector.get("V3"), Some(-2.5));
    assert_eq!(vector.get("Class"), None);
}

/// Test: Artifact errors are classified for fallback handling
#[test]
fn test_artifact_error_classification() {
    let missing = FraudError::ArtifactMissing {
        path: "models/scaler.stats".into(),
    };
    let corrupt = FraudError::corrupt("models/scaler.stats", "truncated");
    let invalid = FraudError::InvalidFeatureVector("bad".to_string());

    assert!(missing.is_artifact_error());
    assert!(corrupt.is_artifact_error());
    assert!(!invalid.is_artifact_error());
    assert!(corrupt.to_string().contains("truncated"));
}
