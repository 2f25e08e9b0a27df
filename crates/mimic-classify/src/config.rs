//! Configuration builder for gesture classifiers.

use mimic_trees::TreeError;

use crate::error::ClassifierError;
use crate::sample::UNKNOWN_LABEL;

/// Configuration shared by every classifier variant.
///
/// Construct via [`ClassifierConfig::new`], then chain `with_*` methods.
/// Values are checked by [`ClassifierConfig::validate`], which every
/// classifier constructor calls.
///
/// # Defaults
///
/// | Parameter                    | Default  |
/// |------------------------------|----------|
/// | `confidence_threshold`       | 0.6      |
/// | `num_rf_trees`               | 20       |
/// | `num_gb_trees`               | 10       |
/// | `max_depth`                  | 8        |
/// | `min_samples_per_leaf`       | 2        |
/// | `feature_sampling_ratio`     | 0.7      |
/// | `learning_rate`              | 0.1      |
/// | `seed`                       | `None`   |
/// | `idle_detection`             | `true`   |
/// | `movement_threshold`         | 0.01     |
/// | `stability_threshold`        | 0.7      |
/// | `idle_label`                 | `"idle"` |
/// | `velocity_threshold`         | 0.25     |
/// | `transition_consensus_boost` | 1        |
/// | `transition_hold_frames`     | 3        |
/// | `auto_tune_threshold`        | `false`  |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassifierConfig {
    pub(crate) confidence_threshold: f64,
    pub(crate) num_rf_trees: usize,
    pub(crate) num_gb_trees: usize,
    pub(crate) max_depth: usize,
    pub(crate) min_samples_per_leaf: usize,
    pub(crate) feature_sampling_ratio: f64,
    pub(crate) learning_rate: f64,
    pub(crate) seed: Option<u64>,
    pub(crate) idle_detection: bool,
    pub(crate) movement_threshold: f64,
    pub(crate) stability_threshold: f64,
    pub(crate) idle_label: String,
    pub(crate) velocity_threshold: f64,
    pub(crate) transition_consensus_boost: usize,
    pub(crate) transition_hold_frames: usize,
    pub(crate) auto_tune_threshold: bool,
}

impl ClassifierConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            confidence_threshold: 0.6,
            num_rf_trees: 20,
            num_gb_trees: 10,
            max_depth: 8,
            min_samples_per_leaf: 2,
            feature_sampling_ratio: 0.7,
            learning_rate: 0.1,
            seed: None,
            idle_detection: true,
            movement_threshold: 0.01,
            stability_threshold: 0.7,
            idle_label: "idle".to_string(),
            velocity_threshold: 0.25,
            transition_consensus_boost: 1,
            transition_hold_frames: 3,
            auto_tune_threshold: false,
        }
    }

    /// Set the minimum calibrated confidence for a non-unknown answer.
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the number of bagged forest trees.
    #[must_use]
    pub fn with_num_rf_trees(mut self, n: usize) -> Self {
        self.num_rf_trees = n;
        self
    }

    /// Set the number of boosting rounds (zero disables boosting).
    #[must_use]
    pub fn with_num_gb_trees(mut self, n: usize) -> Self {
        self.num_gb_trees = n;
        self
    }

    /// Set the forest depth limit; boosting uses half of it.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the sample count at or below which a node becomes a leaf.
    #[must_use]
    pub fn with_min_samples_per_leaf(mut self, n: usize) -> Self {
        self.min_samples_per_leaf = n;
        self
    }

    /// Set the fraction of features offered to each forest tree.
    #[must_use]
    pub fn with_feature_sampling_ratio(mut self, ratio: f64) -> Self {
        self.feature_sampling_ratio = ratio;
        self
    }

    /// Set the boosting shrinkage.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Seed the training RNG; `None` draws a seed from the OS.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable the idle short-circuit.
    #[must_use]
    pub fn with_idle_detection(mut self, enabled: bool) -> Self {
        self.idle_detection = enabled;
        self
    }

    /// Set the feature spread below which the stream counts as idle.
    #[must_use]
    pub fn with_movement_threshold(mut self, threshold: f64) -> Self {
        self.movement_threshold = threshold;
        self
    }

    /// Set the idle confidence needed to short-circuit to the idle label.
    #[must_use]
    pub fn with_stability_threshold(mut self, threshold: f64) -> Self {
        self.stability_threshold = threshold;
        self
    }

    /// Set the label reported for idle frames.
    ///
    /// While idle detection is enabled no training class may use this label;
    /// training rejects such sample sets.
    #[must_use]
    pub fn with_idle_label(mut self, label: impl Into<String>) -> Self {
        self.idle_label = label.into();
        self
    }

    /// Set the mean per-feature change that marks a motion spike.
    #[must_use]
    pub fn with_velocity_threshold(mut self, threshold: f64) -> Self {
        self.velocity_threshold = threshold;
        self
    }

    /// Set the extra votes required while transitioning.
    #[must_use]
    pub fn with_transition_consensus_boost(mut self, boost: usize) -> Self {
        self.transition_consensus_boost = boost;
        self
    }

    /// Set how many frames a motion spike keeps the stream transitioning.
    #[must_use]
    pub fn with_transition_hold_frames(mut self, frames: usize) -> Self {
        self.transition_hold_frames = frames;
        self
    }

    /// Tune the threshold on the training set after every successful train.
    #[must_use]
    pub fn with_auto_tune_threshold(mut self, enabled: bool) -> Self {
        self.auto_tune_threshold = enabled;
        self
    }

    /// Return the configured confidence threshold.
    #[must_use]
    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Return the number of forest trees.
    #[must_use]
    pub fn num_rf_trees(&self) -> usize {
        self.num_rf_trees
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn num_gb_trees(&self) -> usize {
        self.num_gb_trees
    }

    /// Return the forest depth limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the leaf sample-count limit.
    #[must_use]
    pub fn min_samples_per_leaf(&self) -> usize {
        self.min_samples_per_leaf
    }

    /// Return the feature sampling ratio.
    #[must_use]
    pub fn feature_sampling_ratio(&self) -> f64 {
        self.feature_sampling_ratio
    }

    /// Return the boosting learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the training seed, if fixed.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Return whether idle detection is enabled.
    #[must_use]
    pub fn idle_detection(&self) -> bool {
        self.idle_detection
    }

    /// Return the idle movement threshold.
    #[must_use]
    pub fn movement_threshold(&self) -> f64 {
        self.movement_threshold
    }

    /// Return the idle stability threshold.
    #[must_use]
    pub fn stability_threshold(&self) -> f64 {
        self.stability_threshold
    }

    /// Return the idle label.
    #[must_use]
    pub fn idle_label(&self) -> &str {
        &self.idle_label
    }

    /// Return the motion-spike velocity threshold.
    #[must_use]
    pub fn velocity_threshold(&self) -> f64 {
        self.velocity_threshold
    }

    /// Return the extra consensus votes required while transitioning.
    #[must_use]
    pub fn transition_consensus_boost(&self) -> usize {
        self.transition_consensus_boost
    }

    /// Return the transition hold length in frames.
    #[must_use]
    pub fn transition_hold_frames(&self) -> usize {
        self.transition_hold_frames
    }

    /// Return whether the threshold is tuned after training.
    #[must_use]
    pub fn auto_tune_threshold(&self) -> bool {
        self.auto_tune_threshold
    }

    /// Check every value.
    ///
    /// # Errors
    ///
    /// | Variant                                           | When                                   |
    /// |---------------------------------------------------|----------------------------------------|
    /// | [`ClassifierError::InvalidConfidenceThreshold`]   | threshold not in [0, 1]                |
    /// | [`TreeError::InvalidTreeCount`] (wrapped)         | `num_rf_trees` is zero                 |
    /// | [`TreeError::InvalidMaxDepth`] (wrapped)          | `max_depth` is zero                    |
    /// | [`TreeError::InvalidMinSamplesPerLeaf`] (wrapped) | `min_samples_per_leaf` is zero         |
    /// | [`TreeError::InvalidSamplingRatio`] (wrapped)     | ratio not in (0, 1]                    |
    /// | [`TreeError::InvalidLearningRate`] (wrapped)      | learning rate not in (0, 1)            |
    /// | [`ClassifierError::InvalidMovementThreshold`]     | movement threshold not positive        |
    /// | [`ClassifierError::InvalidStabilityThreshold`]    | stability threshold not in [0, 1]      |
    /// | [`ClassifierError::InvalidIdleLabel`]             | idle label empty or `"unknown"`        |
    /// | [`ClassifierError::InvalidVelocityThreshold`]     | velocity threshold not positive        |
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ClassifierError::InvalidConfidenceThreshold {
                threshold: self.confidence_threshold,
            });
        }
        if self.num_rf_trees == 0 {
            return Err(TreeError::InvalidTreeCount { n_trees: 0 }.into());
        }
        if self.max_depth == 0 {
            return Err(TreeError::InvalidMaxDepth { max_depth: 0 }.into());
        }
        if self.min_samples_per_leaf == 0 {
            return Err(TreeError::InvalidMinSamplesPerLeaf {
                min_samples_per_leaf: 0,
            }
            .into());
        }
        if !(self.feature_sampling_ratio > 0.0 && self.feature_sampling_ratio <= 1.0) {
            return Err(TreeError::InvalidSamplingRatio {
                ratio: self.feature_sampling_ratio,
            }
            .into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return Err(TreeError::InvalidLearningRate {
                learning_rate: self.learning_rate,
            }
            .into());
        }
        if !(self.movement_threshold > 0.0 && self.movement_threshold.is_finite()) {
            return Err(ClassifierError::InvalidMovementThreshold {
                threshold: self.movement_threshold,
            });
        }
        if !(0.0..=1.0).contains(&self.stability_threshold) {
            return Err(ClassifierError::InvalidStabilityThreshold {
                threshold: self.stability_threshold,
            });
        }
        if self.idle_label.is_empty() || self.idle_label == UNKNOWN_LABEL {
            return Err(ClassifierError::InvalidIdleLabel {
                label: self.idle_label.clone(),
            });
        }
        if !(self.velocity_threshold > 0.0 && self.velocity_threshold.is_finite()) {
            return Err(ClassifierError::InvalidVelocityThreshold {
                threshold: self.velocity_threshold,
            });
        }
        Ok(())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::new()
    }
}
