/// Errors from tree, forest and boosting operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Returned when a forest is configured with zero trees.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_samples_per_leaf is zero.
    #[error("min_samples_per_leaf must be at least 1, got {min_samples_per_leaf}")]
    InvalidMinSamplesPerLeaf {
        /// The invalid min_samples_per_leaf value provided.
        min_samples_per_leaf: usize,
    },

    /// Returned when feature_sampling_ratio is not in (0.0, 1.0].
    #[error("feature_sampling_ratio must be in (0.0, 1.0], got {ratio}")]
    InvalidSamplingRatio {
        /// The invalid ratio provided.
        ratio: f64,
    },

    /// Returned when importance_bias is not in [0.0, 1.0].
    #[error("importance_bias must be in [0.0, 1.0], got {bias}")]
    InvalidImportanceBias {
        /// The invalid bias provided.
        bias: f64,
    },

    /// Returned when learning_rate is not in the open interval (0.0, 1.0).
    #[error("learning_rate must be in (0.0, 1.0), got {learning_rate}")]
    InvalidLearningRate {
        /// The invalid learning rate provided.
        learning_rate: f64,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when the number of labels differs from the number of rows.
    #[error("got {n_labels} labels for {n_rows} feature rows")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a sample carries an empty label.
    #[error("sample {sample_index} has an empty label")]
    EmptyLabel {
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when true and predicted label slices have different lengths.
    #[error("got {n_predicted} predictions for {n_true} true labels")]
    PredictionCountMismatch {
        /// Number of true labels.
        n_true: usize,
        /// Number of predictions.
        n_predicted: usize,
    },

    /// Returned when a class index is outside the declared class range.
    #[error("class index {class} is out of range for {n_classes} classes")]
    ClassOutOfRange {
        /// The offending class index.
        class: usize,
        /// The number of declared classes.
        n_classes: usize,
    },
}
