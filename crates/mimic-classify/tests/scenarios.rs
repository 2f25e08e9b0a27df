//! Behavioural regression tests for the gesture classifiers.
//!
//! Deterministic synthetic poses: clusters of small Gaussian noise around
//! fixed means, generated from a seeded `ChaCha8Rng`.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use mimic_classify::{
    Classification, ClassifierConfig, ClassifierKind, EnsembleClassifier, GestureClassifier,
    HISTORY_CAPACITY, PredictionRecord, Sample, UNKNOWN_LABEL, build_classifier,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 3 classes × 30 samples in 3 dimensions with σ = 0.05 noise.
fn three_poses(seed: u64) -> Vec<Sample> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let means = [
        ("A", [0.0, 0.0, 0.0]),
        ("B", [1.0, 1.0, 1.0]),
        ("C", [0.0, 1.0, 0.0]),
    ];
    let mut samples = Vec::with_capacity(90);
    for _ in 0..30 {
        for (label, mean) in &means {
            let features = mean.iter().map(|m| m + noise.sample(&mut rng)).collect();
            samples.push(Sample::new(features, *label));
        }
    }
    samples
}

fn seeded_config() -> ClassifierConfig {
    ClassifierConfig::new()
        .with_seed(Some(7))
        .with_idle_detection(false)
}

fn trained_ensemble(config: ClassifierConfig) -> EnsembleClassifier {
    let mut clf = EnsembleClassifier::new(config).unwrap();
    assert!(clf.train(&three_poses(42)));
    clf
}

/// Queries spread around and between the three poses.
fn query_set() -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let spread = Normal::new(0.5, 0.6).unwrap();
    (0..60)
        .map(|_| (0..3).map(|_| spread.sample(&mut rng)).collect())
        .collect()
}

fn record(label: &str, confidence: f64) -> PredictionRecord {
    PredictionRecord::new(&Classification::new(label, confidence), &[0.0, 0.0, 0.0])
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn near_centroid_query_is_classified() {
    let mut clf = trained_ensemble(seeded_config());
    let result = clf.predict(&[0.05, 0.02, -0.01]);
    assert_eq!(result.label, "A");
    assert!(
        result.confidence >= clf.confidence_threshold(),
        "confidence = {}",
        result.confidence
    );
}

#[test]
fn far_outlier_is_unknown() {
    let mut clf = trained_ensemble(seeded_config());
    assert!(clf.predict(&[5.0, 5.0, 5.0]).is_unknown());
}

#[test]
fn constant_feature_has_no_importance() {
    let mut samples = Vec::new();
    for i in 0..20 {
        let jitter = f64::from(i % 5) * 0.01;
        samples.push(Sample::new(vec![0.5, 0.0, 0.3 + jitter], "A"));
        samples.push(Sample::new(vec![0.5, 1.0, 0.32 - jitter], "B"));
    }
    let mut clf = EnsembleClassifier::new(seeded_config()).unwrap();
    assert!(clf.train(&samples));

    let importance = clf.feature_importance().unwrap();
    assert!(importance.score(0).abs() < 1e-9, "constant = {}", importance.score(0));
    assert!(importance.score(1) > 0.99, "separator = {}", importance.score(1));
    assert_eq!(importance.top(1), vec![1]);
}

#[test]
fn empty_training_leaves_classifier_untrained() {
    for kind in [
        ClassifierKind::Ensemble,
        ClassifierKind::NearestNeighbors { k: 3 },
        ClassifierKind::SingleTree,
    ] {
        let mut clf = build_classifier(kind, seeded_config()).unwrap();
        assert!(!clf.train(&[]), "{} accepted an empty set", clf.name());
        assert!(!clf.is_trained());
        assert_eq!(clf.predict(&[0.0, 0.0, 0.0]), Classification::unknown(0.0));
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn far_queries_never_pass_the_threshold() {
    for kind in [
        ClassifierKind::Ensemble,
        ClassifierKind::NearestNeighbors { k: 5 },
        ClassifierKind::SingleTree,
    ] {
        let mut clf = build_classifier(kind, seeded_config()).unwrap();
        assert!(clf.train(&three_poses(42)));
        for query in [[5.0, 5.0, 5.0], [-4.0, 0.0, 0.0], [0.5, 9.0, -3.0]] {
            clf.reset_stream();
            let result = clf.predict(&query);
            assert!(
                result.is_unknown() || result.confidence < clf.confidence_threshold(),
                "{} answered {result:?} for {query:?}",
                clf.name()
            );
        }
    }
}

#[test]
fn same_seed_same_answers() {
    let mut first = trained_ensemble(seeded_config());
    let mut second = trained_ensemble(seeded_config());
    for query in query_set() {
        assert_eq!(first.predict(&query), second.predict(&query));
    }
}

#[test]
fn raising_threshold_never_accepts_more() {
    let accepted = |threshold: f64| {
        let mut clf = trained_ensemble(seeded_config().with_confidence_threshold(threshold));
        query_set()
            .iter()
            .filter(|q| !clf.predict(q).is_unknown())
            .count()
    };
    let counts: Vec<usize> = [0.2, 0.4, 0.6, 0.8, 0.95].map(accepted).to_vec();
    assert!(
        counts.windows(2).all(|w| w[0] >= w[1]),
        "accepted counts = {counts:?}"
    );
}

#[test]
fn window_answers_have_enough_support() {
    let mut clf = trained_ensemble(seeded_config());
    let threshold = clf.confidence_threshold();
    let windows: Vec<Vec<PredictionRecord>> = vec![
        vec![],
        vec![record("A", 0.9)],
        vec![record("A", 0.9), record("A", 0.5), record("B", 0.95)],
        vec![record("B", 0.9), record("B", 0.8), record("B", 0.7)],
        (0..15).map(|_| record("A", 0.9)).collect(),
        vec![record(UNKNOWN_LABEL, 0.99), record(UNKNOWN_LABEL, 0.99)],
    ];

    let query = [0.02, 0.01, 0.0];
    let current = clf.score(&query).unwrap().classify(threshold);

    for priors in &windows {
        for required in 1..=4 {
            clf.reset_stream();
            let result = clf.predict_with_window(&query, priors, required);
            if result.is_unknown() {
                continue;
            }
            let recent = &priors[priors.len().saturating_sub(HISTORY_CAPACITY)..];
            let support = recent
                .iter()
                .chain(std::iter::once(&PredictionRecord::new(&current, &query)))
                .filter(|r| r.label == result.label && r.confidence >= threshold)
                .count();
            assert!(
                support >= required,
                "{result:?} had {support} votes, needed {required}"
            );
        }
    }
}

#[test]
fn history_consensus_builds_up() {
    let mut clf = trained_ensemble(seeded_config());
    let first = clf.predict_with_history(&[0.01, 0.0, 0.02], 3);
    assert!(first.is_unknown());
    let second = clf.predict_with_history(&[0.0, 0.03, 0.01], 3);
    assert!(second.is_unknown());
    let third = clf.predict_with_history(&[0.02, 0.01, 0.0], 3);
    assert_eq!(third.label, "A");
    assert!(third.confidence <= 1.0);
}

#[test]
fn moving_stream_is_never_idle_at_zero_stability() {
    let mut clf = trained_ensemble(
        ClassifierConfig::new()
            .with_seed(Some(7))
            .with_idle_label("rest")
            .with_stability_threshold(0.0),
    );
    let poses = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 0.0]];
    for i in 0..12 {
        let answer = clf.predict(&poses[i % poses.len()]);
        assert_ne!(answer.label, "rest", "frame {i} answered {answer:?}");
    }
    assert_eq!(clf.stream().idle_detector().map(|d| d.is_idle()), Some(false));
}

#[test]
fn still_stream_reports_idle() {
    let mut clf = trained_ensemble(
        ClassifierConfig::new()
            .with_seed(Some(7))
            .with_idle_label("rest"),
    );
    let frame = [1.0, 1.0, 1.0];
    let answers: Vec<Classification> = (0..6).map(|_| clf.predict(&frame)).collect();
    assert_eq!(answers[0].label, "B");
    assert_eq!(answers[5].label, "rest");
    assert!((answers[5].confidence - 1.0).abs() < 1e-12);
}
