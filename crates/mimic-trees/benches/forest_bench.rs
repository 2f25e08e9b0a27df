//! Criterion benchmarks for mimic-trees: forest and boosting training and prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use mimic_trees::{GradientBoostingConfig, RandomForestConfig, TrainingSet};

fn make_poses(n_samples: usize, n_features: usize, n_classes: usize, seed: u64) -> TrainingSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(format!("pose{class}"));
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 0.3 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.2
            })
            .collect();
        rows.push(row);
    }
    TrainingSet::new(rows, labels).unwrap()
}

fn bench_forest_train(c: &mut Criterion) {
    let data = make_poses(200, 24, 5, 42);
    let cfg = RandomForestConfig::new(20).unwrap();

    c.bench_function("forest_train_200x24_5class_20trees", |b| {
        b.iter(|| cfg.fit(&data, &mut ChaCha8Rng::seed_from_u64(42)).unwrap());
    });
}

fn bench_boost_train(c: &mut Criterion) {
    let data = make_poses(200, 24, 5, 42);
    let cfg = GradientBoostingConfig::new(10).with_forest_depth(8);

    c.bench_function("boost_train_200x24_5class_10rounds", |b| {
        b.iter(|| cfg.fit(&data).unwrap());
    });
}

fn bench_combined_predict(c: &mut Criterion) {
    let data = make_poses(200, 24, 5, 42);
    let forest = RandomForestConfig::new(20)
        .unwrap()
        .fit(&data, &mut ChaCha8Rng::seed_from_u64(42))
        .unwrap();
    let boosted = GradientBoostingConfig::new(10).fit(&data).unwrap();
    let sample = data.rows()[17].clone();

    c.bench_function("combined_predict_single_frame", |b| {
        b.iter(|| {
            let p = forest.predict_proba(&sample).unwrap();
            boosted.combine(p.as_slice(), &sample)
        });
    });
}

criterion_group!(benches, bench_forest_train, bench_boost_train, bench_combined_predict);
criterion_main!(benches);
