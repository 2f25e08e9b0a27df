//! Criterion benchmarks for mimic-classify: training and the per-frame pipeline.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use mimic_classify::{
    ClassifierConfig, ClassifierKind, EnsembleClassifier, GestureClassifier, Sample,
    build_classifier,
};

/// Pose-sized frames: 5 classes around distinct means with small jitter.
fn make_samples(n_per_class: usize, n_features: usize, seed: u64) -> Vec<Sample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let mut samples = Vec::with_capacity(n_per_class * 5);
    for _ in 0..n_per_class {
        for class in 0..5 {
            let features = (0..n_features)
                .map(|f| ((class + f) % 5) as f64 * 0.2 + noise.sample(&mut rng))
                .collect();
            samples.push(Sample::new(features, format!("pose{class}")));
        }
    }
    samples
}

fn config() -> ClassifierConfig {
    ClassifierConfig::new()
        .with_seed(Some(42))
        .with_idle_detection(false)
}

fn bench_ensemble_train(c: &mut Criterion) {
    let samples = make_samples(40, 24, 42);

    c.bench_function("ensemble_train_200x24_5class", |b| {
        b.iter(|| {
            let mut clf = EnsembleClassifier::new(config()).unwrap();
            clf.train(black_box(&samples))
        });
    });
}

fn bench_predict(c: &mut Criterion) {
    let samples = make_samples(40, 24, 42);
    let frame = samples[17].features().to_vec();

    for kind in [
        ClassifierKind::Ensemble,
        ClassifierKind::NearestNeighbors { k: 5 },
        ClassifierKind::SingleTree,
    ] {
        let mut clf = build_classifier(kind, config()).unwrap();
        clf.train(&samples);
        c.bench_function(&format!("predict_single_frame_{}", clf.name()), |b| {
            b.iter(|| clf.predict(black_box(&frame)));
        });
    }
}

fn bench_predict_with_history(c: &mut Criterion) {
    let samples = make_samples(40, 24, 42);
    let frame = samples[17].features().to_vec();
    let mut clf = EnsembleClassifier::new(config().with_idle_detection(true)).unwrap();
    clf.train(&samples);

    c.bench_function("predict_with_history_consensus_3", |b| {
        b.iter(|| clf.predict_with_history(black_box(&frame), 3));
    });
}

criterion_group!(
    benches,
    bench_ensemble_train,
    bench_predict,
    bench_predict_with_history
);
criterion_main!(benches);
