//! Frame-by-frame gesture classification on top of `mimic-trees`.
//!
//! A [`GestureClassifier`] turns labeled feature vectors into a model, then
//! answers one `(label, confidence)` per frame. The shared frame pipeline
//! short-circuits idle streams, discounts out-of-distribution frames by an
//! anomaly score, abstains with `"unknown"` below the confidence threshold
//! and can vote a frame against recent history.
//!
//! Three variants implement the trait: [`EnsembleClassifier`] (bagged forest
//! plus boosted residual trees), [`NearestNeighborClassifier`] and
//! [`SingleTreeClassifier`]. [`CrossValidation`] evaluates any of them.

mod anomaly;
mod classifier;
mod config;
mod consensus;
mod ensemble;
mod error;
mod eval;
mod idle;
mod knn;
mod sample;
mod single_tree;
mod tuning;

pub use anomaly::{
    AnomalyScorer, ClassCentroid, DISTANCE_ALLOWANCE, DISTANCE_SCALE, GLOBAL_STD_FRACTION,
    MIN_STD_DEV,
};
pub use classifier::{ClassifierKind, GestureClassifier, build_classifier};
pub use config::ClassifierConfig;
pub use consensus::{FrameState, FrameStream, MotionTracker, STABILITY_BONUS, vote};
pub use ensemble::{EnsembleClassifier, EnsembleModel};
pub use error::ClassifierError;
pub use eval::{CrossValidation, CrossValidationResult};
pub use idle::{IDLE_WINDOW, IdleDetector, TRACKED_FEATURES};
pub use knn::NearestNeighborClassifier;
pub use sample::{
    Classification, HISTORY_CAPACITY, PredictionHistory, PredictionRecord, Sample, Score,
    UNKNOWN_LABEL, training_set,
};
pub use single_tree::SingleTreeClassifier;
pub use tuning::{TUNING_RADIUS, TUNING_STEP, ThresholdTuning, candidate_thresholds, tune_threshold};
