use fraud_engine::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;

/// Legitimate rows around the origin, every tenth row a shifted fraud row
fn reference_rows(n: usize, seed: u64) -> (Vec<FeatureVector>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let fraud = i % 10 == 0;
        let mut values = [0.0; 30];
        values[0] = i as f64 * 90.0;
        for v in values[1..29].iter_mut() {
            *v = rng.gen_range(-1.5..1.5);
        }
        if fraud {
            for v in values[1..5].iter_mut() {
                *v += 3.0;
            }
        }
        values[29] = if fraud {
            rng.gen_range(200.0..900.0)
        } else {
            rng.gen_range(1.0..150.0)
        };
        rows.push(FeatureVector::from_values(values).unwrap());
        labels.push(u8::from(fraud));
    }
    (rows, labels)
}

fn write_statistics(dir: &Path) -> FittedStatistics {
    let (rows, _) = reference_rows(200, 1);
    let stats = Preprocessor::fit(&rows).unwrap();
    stats.save(&dir.join("scaler.stats")).unwrap();
    stats
}

fn write_network(dir: &Path) -> NeuralPredictor {
    let mut rng = StdRng::seed_from_u64(5);
    let predictor = NeuralPredictor::new(NetworkParameters::initialize(&mut rng)).unwrap();
    predictor.save(&dir.join("model.net")).unwrap();
    predictor
}

fn engine_for(dir: &Path) -> ScoringEngine {
    ScoringEngine::new(ModelConfig::new(
        dir.join("scaler.stats"),
        dir.join("model.net"),
    ))
    .unwrap()
}

/// Raw vector whose normalised form has the given z-scores
fn raw_from_z(stats: &FittedStatistics, z: &[(usize, f64)]) -> FeatureVector {
    let mut values = *stats.means();
    for &(idx, score) in z {
        values[idx] = stats.mean(idx) + score * stats.scale(idx);
    }
    FeatureVector::from_values(values).unwrap()
}

/// Test: No artifacts at all selects the heuristic and still scores
#[test]
fn test_absent_artifacts_select_heuristic() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(dir.path());

    let (rows, _) = reference_rows(5, 2);
    let result = engine.score(&rows[1]).unwrap();

    assert_eq!(result.backend, Backend::Heuristic);
    assert!((0.0..=1.0).contains(&result.probability));
    assert_eq!(engine.active_backend(), Backend::Heuristic);

    let status = engine.status();
    assert_eq!(status.statistics_source, StatisticsSource::Identity);
    let reason = status.fallback_reason.unwrap();
    assert!(reason.contains("statistics"));
    assert!(reason.contains("network"));
}

/// Test: Both artifacts present selects the model and matches a direct forward pass
#[test]
fn test_both_artifacts_select_model() {
    let dir = tempfile::tempdir().unwrap();
    let stats = write_statistics(dir.path());
    let predictor = write_network(dir.path());
    let engine = engine_for(dir.path());

    assert_eq!(engine.active_backend(), Backend::Model);

    let (rows, _) = reference_rows(20, 3);
    for raw in &rows {
        let result = engine.score(raw).unwrap();
        let expected = predictor.score(&stats.transform(raw).unwrap());
        assert_eq!(result.backend, Backend::Model);
        assert!((result.probability - expected).abs() < 1e-9);
        assert_eq!(result.risk_tier, RiskTier::from_probability(result.probability));
    }

    let status = engine.status();
    assert!(status.fallback_reason.is_none());
    assert_eq!(status.statistics_source, StatisticsSource::Fitted);
}

/// Test: A truncated statistics artifact never surfaces as an error
#[test]
fn test_truncated_statistics_fall_back_silently() {
    let dir = tempfile::tempdir().unwrap();
    write_statistics(dir.path());
    write_network(dir.path());

    let path = dir.path().join("scaler.stats");
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let engine = engine_for(dir.path());
    let result = engine.score(&FeatureVector::zeros()).unwrap();

    assert_eq!(result.backend, Backend::Heuristic);
    let status = engine.status();
    assert_eq!(status.statistics_source, StatisticsSource::Identity);
    assert!(status.fallback_reason.unwrap().contains("corrupt"));
}

/// Test: Garbage in place of the network keeps the fitted statistics
#[test]
fn test_corrupt_network_keeps_fitted_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let stats = write_statistics(dir.path());
    std::fs::write(dir.path().join("model.net"), b"definitely not a network").unwrap();

    let engine = engine_for(dir.path());
    assert_eq!(engine.active_backend(), Backend::Heuristic);
    assert_eq!(engine.status().statistics_source, StatisticsSource::Fitted);
    let loaded = engine.selection().statistics();
    for idx in 0..30 {
        assert!((loaded.mean(idx) - stats.mean(idx)).abs() < 1e-9);
        assert!((loaded.scale(idx) - stats.scale(idx)).abs() < 1e-9);
    }
}

/// Test: Missing statistics alone is enough to lose the model backend
#[test]
fn test_network_without_statistics_is_heuristic() {
    let dir = tempfile::tempdir().unwrap();
    write_network(dir.path());

    let engine = engine_for(dir.path());
    assert_eq!(engine.active_backend(), Backend::Heuristic);
}

/// Test: Amount at +5σ with three PCA outliers is HIGH or worse
#[test]
fn test_compound_anomaly_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let stats = write_statistics(dir.path());
    let engine = engine_for(dir.path());

    let raw = raw_from_z(&stats, &[(29, 5.0), (2, 4.0), (9, -3.5), (14, 6.0)]);
    let result = engine.score(&raw).unwrap();

    assert_eq!(result.backend, Backend::Heuristic);
    assert!(result.probability > 0.6);
    assert!(result.risk_tier.is_elevated());
}

/// Test: A vector sitting exactly on the means is LOW
#[test]
fn test_mean_vector_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let stats = write_statistics(dir.path());
    let engine = engine_for(dir.path());

    let result = engine.score(&raw_from_z(&stats, &[])).unwrap();
    assert!(result.probability < 0.3);
    assert_eq!(result.risk_tier, RiskTier::Low);
}

/// Test: Malformed raw input fails fast and is counted
#[test]
fn test_invalid_input_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(dir.path());

    assert!(matches!(
        engine.score_values(&[0.0; 29]),
        Err(FraudError::InvalidFeatureVector(_))
    ));

    let mut values = [0.0; 30];
    values[4] = f64::NAN;
    assert!(matches!(
        engine.score_values(&values),
        Err(FraudError::InvalidFeatureVector(_))
    ));

    assert!(engine.score_values(&[0.0; 30]).is_ok());
    assert_eq!(engine.metrics().invalid_inputs(), 2);
}

/// Test: Concurrent first calls agree on a single backend
#[test]
fn test_concurrent_first_use() {
    let dir = tempfile::tempdir().unwrap();
    write_statistics(dir.path());
    write_network(dir.path());
    let engine = Arc::new(engine_for(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut values = [0.0; 30];
                values[29] = i as f64 * 10.0;
                engine.score_values(&values).unwrap().backend
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Backend::Model);
    }
    assert_eq!(engine.metrics().total_scores(), 8);
}

/// Test: Batch scoring preserves order and feeds the metrics
#[test]
fn test_score_batch_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(dir.path());
    let (rows, _) = reference_rows(10, 4);

    let results = engine.score_batch(&rows).unwrap();
    assert_eq!(results.len(), 10);
    for (raw, result) in rows.iter().zip(&results) {
        assert_eq!(engine.score(raw).unwrap(), *result);
    }

    let counted: u64 = [RiskTier::Low, RiskTier::Medium, RiskTier::High, RiskTier::Critical]
        .iter()
        .map(|tier| engine.metrics().scores_for(Backend::Heuristic, *tier))
        .sum();
    assert_eq!(counted, 20);

    let text = engine.metrics().encode_text().unwrap();
    assert!(text.contains("fraud_active_backend{backend=\"HEURISTIC\"} 1"));
}

/// Test: score_and_record hands every result to the recorder
#[tokio::test]
async fn test_score_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_for(dir.path());
    let recorder = RecorderHandle::spawn(Box::new(InMemoryRecorder::default()));

    let (rows, _) = reference_rows(3, 6);
    let mut results = Vec::new();
    for (i, raw) in rows.iter().enumerate() {
        results.push(
            engine
                .score_and_record(format!("tx-{}", i), raw, &recorder)
                .unwrap(),
        );
    }

    let recorder = recorder.shutdown().await.unwrap();
    let recent = recorder.recent(10);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].transaction_id, "tx-2");
    assert_eq!(recent[2].transaction_id, "tx-0");
    assert_eq!(recent[0].probability, results[2].probability);
    assert_eq!(recent[0].backend, Backend::Heuristic);
}
