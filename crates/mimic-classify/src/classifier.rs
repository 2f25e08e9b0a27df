//! The classifier capability set and variant selection.

use mimic_trees::FeatureImportance;

use crate::config::ClassifierConfig;
use crate::consensus::{FrameStream, vote};
use crate::ensemble::EnsembleClassifier;
use crate::error::ClassifierError;
use crate::knn::NearestNeighborClassifier;
use crate::sample::{Classification, PredictionRecord, Sample, Score};
use crate::single_tree::SingleTreeClassifier;

/// A trainable per-frame gesture classifier.
///
/// Implementors supply training and pure scoring; the frame pipeline
/// (idle short-circuit, threshold, history, consensus voting) is shared
/// through the provided methods.
pub trait GestureClassifier: Send {
    /// Short variant name for logs and reports.
    fn name(&self) -> &'static str;

    /// Rebuild the model from `samples`. Returns `false` and leaves the
    /// classifier untrained when the samples are rejected.
    fn train(&mut self, samples: &[Sample]) -> bool;

    /// Return `true` once a model is available.
    fn is_trained(&self) -> bool;

    /// Score one frame without touching stream state. `None` when untrained
    /// or when the frame contains non-finite values.
    fn score(&self, features: &[f64]) -> Option<Score>;

    /// The threshold currently applied to calibrated confidence.
    fn confidence_threshold(&self) -> f64;

    /// Normalized feature importance of the trained model.
    fn feature_importance(&self) -> Option<&FeatureImportance>;

    /// Sorted class labels of the trained model.
    fn classes(&self) -> &[String];

    /// The per-stream state behind [`GestureClassifier::predict`].
    fn stream(&self) -> &FrameStream;

    /// Mutable access to the per-stream state.
    fn stream_mut(&mut self) -> &mut FrameStream;

    /// Classify one frame and record it in the history.
    ///
    /// Untrained classifiers and non-finite frames give `("unknown", 0)`.
    /// A still stream may short-circuit to the idle label.
    fn predict(&mut self, features: &[f64]) -> Classification {
        if !self.is_trained() || features.iter().any(|v| !v.is_finite()) {
            return Classification::unknown(0.0);
        }
        let result = match self.stream_mut().observe(features) {
            Some(idle) => idle,
            None => {
                let threshold = self.confidence_threshold();
                self.score(features)
                    .map_or_else(|| Classification::unknown(0.0), |s| s.classify(threshold))
            }
        };
        self.stream_mut().record(features, &result);
        result
    }

    /// Classify one frame, then vote it against caller-supplied `priors`.
    fn predict_with_window(
        &mut self,
        features: &[f64],
        priors: &[PredictionRecord],
        required_consensus: usize,
    ) -> Classification {
        let current = self.predict(features);
        let required = self.stream().effective_consensus(required_consensus);
        vote(&current, priors, self.confidence_threshold(), required)
    }

    /// Classify one frame, then vote it against this classifier's own history.
    fn predict_with_history(&mut self, features: &[f64], required_consensus: usize) -> Classification {
        let priors = self.stream().history().to_vec();
        self.predict_with_window(features, &priors, required_consensus)
    }

    /// Forget the stream: history, idle window and motion state.
    fn reset_stream(&mut self) {
        self.stream_mut().reset();
    }
}

/// Which classifier variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassifierKind {
    /// Bagged forest plus boosted residual trees.
    Ensemble,
    /// Majority vote of the `k` nearest training samples.
    NearestNeighbors {
        /// Number of neighbours.
        k: usize,
    },
    /// One entropy decision tree on every feature.
    SingleTree,
}

/// Construct the variant selected by `kind`.
///
/// # Errors
///
/// Returns the variant constructor's configuration error.
pub fn build_classifier(
    kind: ClassifierKind,
    config: ClassifierConfig,
) -> Result<Box<dyn GestureClassifier>, ClassifierError> {
    Ok(match kind {
        ClassifierKind::Ensemble => Box::new(EnsembleClassifier::new(config)?),
        ClassifierKind::NearestNeighbors { k } => {
            Box::new(NearestNeighborClassifier::new(config, k)?)
        }
        ClassifierKind::SingleTree => Box::new(SingleTreeClassifier::new(config)?),
    })
}
