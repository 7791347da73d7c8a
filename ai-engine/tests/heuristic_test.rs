use fraud_engine::*;
use std::sync::Arc;

const TIME: usize = 0;
const AMOUNT: usize = 29;

fn identity_predictor() -> HeuristicPredictor {
    HeuristicPredictor::new(Arc::new(FittedStatistics::identity()))
}

fn vector(set: &[(usize, f64)]) -> FeatureVector {
    let mut values = [0.0; 30];
    for &(idx, v) in set {
        values[idx] = v;
    }
    FeatureVector::from_values(values).unwrap()
}

/// Test: +5σ amount with three PCA outliers crosses into HIGH
#[test]
fn test_compound_anomaly_is_high() {
    let predictor = identity_predictor();
    // 14:00 so only the anomaly rules contribute
    let v = vector(&[(TIME, 14.0 * 3600.0), (AMOUNT, 5.0), (1, 3.2), (8, -4.1), (20, 7.0)]);

    let breakdown = predictor.explain(&v);
    assert_eq!(breakdown.indicator_count(), 4);
    assert_eq!(breakdown.combination_points, 0.15);
    assert_eq!(breakdown.time_points, 0.0);

    let p = predictor.score(&v);
    assert!(p > 0.6, "probability {}", p);
    assert!(RiskTier::from_probability(p).is_elevated());
}

/// Test: The all-zero vector is LOW
#[test]
fn test_mean_vector_is_low() {
    let p = identity_predictor().score(&FeatureVector::zeros());
    assert!(p < 0.3);
    assert_eq!(RiskTier::from_probability(p), RiskTier::Low);
}

/// Test: Scoring is pure; call history has no influence
#[test]
fn test_scoring_is_pure() {
    let predictor = identity_predictor();
    let quiet = vector(&[(TIME, 50_000.0)]);
    let loud = vector(&[(AMOUNT, 9.0), (3, 5.0), (4, 5.0), (5, 5.0), (6, 5.0)]);

    let first = predictor.score(&quiet);
    for _ in 0..10 {
        predictor.score(&loud);
    }
    assert_eq!(predictor.score(&quiet), first);
    assert_eq!(predictor.explain(&loud), predictor.explain(&loud));
}

/// Test: The rules top out below CRITICAL
#[test]
fn test_maximum_score_is_bounded() {
    let mut values = [10.0; 30];
    values[TIME] = 3600.0;
    let breakdown = identity_predictor().explain(&FeatureVector::from_values(values).unwrap());

    assert!((breakdown.raw_points - 0.83).abs() < 1e-9);
    assert!(breakdown.probability < 0.85);
    assert_eq!(breakdown.indicator_count(), 29);
}

/// Test: Time of day is recovered through the fitted statistics
#[test]
fn test_hour_uses_fitted_statistics() {
    // Time mean 12h, spread 6h; other fields near zero
    let rows: Vec<FeatureVector> = [6.0, 18.0]
        .iter()
        .map(|h| {
            let mut values = [0.0; 30];
            values[TIME] = h * 3600.0;
            values[AMOUNT] = h * 10.0;
            FeatureVector::from_values(values).unwrap()
        })
        .collect();
    let stats = Arc::new(Preprocessor::fit(&rows).unwrap());
    let predictor = HeuristicPredictor::new(Arc::clone(&stats));

    // z = -1.5 → 12h - 9h = 03:00
    let night = predictor.explain(&vector(&[(TIME, -1.5)]));
    assert!((night.hour_of_day - 3.0).abs() < 1e-9);
    assert_eq!(night.time_points, 0.05);

    // z = 0 → noon
    let noon = predictor.explain(&vector(&[]));
    assert_eq!(noon.time_points, 0.0);
}

/// Test: Negative PCA outliers count the same as positive ones
#[test]
fn test_negative_outliers_count() {
    let predictor = identity_predictor();
    let pos = predictor.score(&vector(&[(TIME, 43_200.0), (7, 4.0)]));
    let neg = predictor.score(&vector(&[(TIME, 43_200.0), (7, -4.0)]));
    assert_eq!(pos, neg);
}
