use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fraud_engine::{
    FeatureVector, FittedStatistics, HeuristicPredictor, ModelConfig, NetworkParameters,
    NeuralPredictor, Preprocessor, ScoringEngine,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn sample_rows(n: usize) -> Vec<FeatureVector> {
    let mut rng = StdRng::seed_from_u64(11);
    (0..n)
        .map(|i| {
            let mut values = [0.0; 30];
            values[0] = i as f64 * 37.0;
            for v in values[1..29].iter_mut() {
                *v = rng.gen_range(-3.0..3.0);
            }
            values[29] = rng.gen_range(0.0..500.0);
            FeatureVector::from_values(values).unwrap()
        })
        .collect()
}

fn bench_transform(c: &mut Criterion) {
    let rows = sample_rows(1_000);
    let stats = Preprocessor::fit(&rows).unwrap();
    let raw = rows[17];

    c.bench_function("preprocessor_transform", |b| {
        b.iter(|| black_box(stats.transform(black_box(&raw))))
    });
}

fn bench_neural_score(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let predictor = NeuralPredictor::new(NetworkParameters::initialize(&mut rng)).unwrap();
    let vector = FeatureVector::zeros();

    c.bench_function("neural_score", |b| {
        b.iter(|| black_box(predictor.score(black_box(&vector))))
    });
}

fn bench_heuristic_score(c: &mut Criterion) {
    let predictor = HeuristicPredictor::new(Arc::new(FittedStatistics::identity()));
    let mut values = [0.0; 30];
    values[29] = 5.0;
    values[3] = -4.0;
    values[7] = 3.5;
    let vector = FeatureVector::from_values(values).unwrap();

    c.bench_function("heuristic_score", |b| {
        b.iter(|| black_box(predictor.score(black_box(&vector))))
    });
}

fn bench_engine_batch(c: &mut Criterion) {
    // Absent artifacts: heuristic backend end to end
    let engine = ScoringEngine::new(ModelConfig::new(
        "/nonexistent/scaler.stats",
        "/nonexistent/model.net",
    ))
    .unwrap();
    let _ = engine.active_backend();

    let mut group = c.benchmark_group("engine_score_batch");
    for size in [1usize, 64, 1024] {
        let rows = sample_rows(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| black_box(engine.score_batch(black_box(rows))))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_transform,
    bench_neural_score,
    bench_heuristic_score,
    bench_engine_batch
);
criterion_main!(benches);
