//! Accuracy regression tests for mimic-trees.
//!
//! These tests verify that algorithmic changes do not degrade forest and
//! boosting accuracy on a deterministic synthetic dataset.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use mimic_trees::{
    ConfusionMatrix, FeatureImportance, GradientBoostingConfig, RandomForestConfig, TrainingSet,
    f_scores,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic pose dataset
// ---------------------------------------------------------------------------

/// Generate a `n_per_class × 3`-sample, 10-feature, 3-class dataset.
///
/// Features 0-2 are informative (class * 1.0 + N(0, 0.15)).
/// Features 3-9 are pure noise N(0.5, 0.15).
fn make_poses(n_per_class: usize, seed: u64) -> TrainingSet {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.15).unwrap();
    let names = ["lunge", "squat", "wave"];

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n_per_class * names.len() {
        let class = i % names.len();
        let row: Vec<f64> = (0..10)
            .map(|f| {
                let base = if f < 3 { class as f64 } else { 0.5 };
                base + noise.sample(&mut rng)
            })
            .collect();
        rows.push(row);
        labels.push(names[class].to_string());
    }
    TrainingSet::new(rows, labels).unwrap()
}

fn holdout_accuracy(predict: impl Fn(&[f64]) -> usize, test: &TrainingSet) -> f64 {
    let predicted: Vec<Option<usize>> = test.rows().iter().map(|r| Some(predict(r))).collect();
    ConfusionMatrix::from_predictions(test.labels(), &predicted, test.n_classes())
        .unwrap()
        .accuracy()
}

// ---------------------------------------------------------------------------
// a) forest holdout accuracy
// ---------------------------------------------------------------------------

#[test]
fn forest_holdout_accuracy_above_threshold() {
    let train = make_poses(40, 42);
    let test = make_poses(20, 7);
    let forest = RandomForestConfig::new(20)
        .unwrap()
        .fit(&train, &mut ChaCha8Rng::seed_from_u64(42))
        .unwrap();

    let accuracy = holdout_accuracy(|r| forest.predict(r).unwrap_or(usize::MAX), &test);
    assert!(accuracy > 0.9, "forest holdout accuracy {accuracy} <= 0.9");
}

// ---------------------------------------------------------------------------
// b) combined forest + boosting accuracy
// ---------------------------------------------------------------------------

#[test]
fn combined_holdout_accuracy_above_threshold() {
    let train = make_poses(40, 42);
    let test = make_poses(20, 7);
    let forest = RandomForestConfig::new(20)
        .unwrap()
        .fit(&train, &mut ChaCha8Rng::seed_from_u64(42))
        .unwrap();
    let boosted = GradientBoostingConfig::new(10)
        .with_forest_depth(8)
        .fit(&train)
        .unwrap();

    let accuracy = holdout_accuracy(
        |r| {
            let p = forest.predict_proba(r).unwrap();
            boosted.combine(p.as_slice(), r).predicted_class()
        },
        &test,
    );
    assert!(accuracy > 0.9, "combined holdout accuracy {accuracy} <= 0.9");
}

// ---------------------------------------------------------------------------
// c) importance concentrates on informative features
// ---------------------------------------------------------------------------

#[test]
fn importance_top_features_are_informative() {
    let train = make_poses(40, 42);
    let forest = RandomForestConfig::new(20)
        .unwrap()
        .fit(&train, &mut ChaCha8Rng::seed_from_u64(3))
        .unwrap();
    let boosted = GradientBoostingConfig::new(10).fit(&train).unwrap();
    let importance =
        FeatureImportance::compute(&forest.split_gains(), &boosted.split_gains(), &f_scores(&train));

    let top = importance.top(1);
    assert!(top[0] < 3, "top feature {top:?} is a noise column");
    assert!((importance.as_slice().iter().copied().fold(0.0, f64::max) - 1.0).abs() < 1e-12);
    assert!(importance.as_slice().iter().all(|&s| (0.0..=1.0).contains(&s)));
}

// ---------------------------------------------------------------------------
// d) seeded determinism
// ---------------------------------------------------------------------------

#[test]
fn same_seed_same_forest() {
    let train = make_poses(20, 1);
    let config = RandomForestConfig::new(10).unwrap();
    let a = config.fit(&train, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
    let b = config.fit(&train, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
    assert_eq!(a.split_gains(), b.split_gains());
    for row in train.rows() {
        assert_eq!(a.predict_proba(row), b.predict_proba(row));
    }
}
