use mimic_trees::TreeError;

/// Errors from classifier configuration, training and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Returned when a tree, forest or boosting step rejects its input.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Returned when the confidence threshold is outside [0.0, 1.0].
    #[error("confidence_threshold must be in [0.0, 1.0], got {threshold}")]
    InvalidConfidenceThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when the idle stability threshold is outside [0.0, 1.0].
    #[error("stability_threshold must be in [0.0, 1.0], got {threshold}")]
    InvalidStabilityThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when the idle movement threshold is not strictly positive.
    #[error("movement_threshold must be positive, got {threshold}")]
    InvalidMovementThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when the transition velocity threshold is not strictly positive.
    #[error("velocity_threshold must be positive, got {threshold}")]
    InvalidVelocityThreshold {
        /// The invalid threshold provided.
        threshold: f64,
    },

    /// Returned when the idle label is empty or collides with the unknown label.
    #[error("idle label {label:?} must be non-empty and differ from \"unknown\"")]
    InvalidIdleLabel {
        /// The rejected label.
        label: String,
    },

    /// Returned when a training class uses the label reserved for idle frames
    /// while idle detection is enabled.
    #[error("class {label:?} collides with the idle label; rename it or disable idle detection")]
    IdleLabelCollision {
        /// The colliding label.
        label: String,
    },

    /// Returned when a nearest-neighbour classifier is configured with k = 0.
    #[error("k must be at least 1, got {k}")]
    InvalidNeighborCount {
        /// The invalid k provided.
        k: usize,
    },

    /// Returned when cross-validation is configured with fewer than 2 folds.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when a class has fewer samples than the number of folds.
    #[error("class {label:?} has {count} samples, need at least {n_folds} for {n_folds}-fold CV")]
    TooFewSamplesForFolds {
        /// The class label with too few samples.
        label: String,
        /// Number of samples in that class.
        count: usize,
        /// Requested number of folds.
        n_folds: usize,
    },

    /// Returned when a classifier refuses a training fold.
    #[error("{classifier} failed to train on fold {fold}")]
    TrainingFailed {
        /// Name of the classifier variant.
        classifier: &'static str,
        /// Zero-based fold index.
        fold: usize,
    },
}
