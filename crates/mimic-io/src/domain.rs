//! Domain types for mimic-io.

use mimic_classify::Sample;

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Labeled training samples read by [`SampleReader`](crate::SampleReader).
#[derive(Debug)]
pub struct SampleSet {
    feature_names: Vec<String>,
    samples: Vec<Sample>,
}

impl SampleSet {
    pub(crate) fn new(feature_names: Vec<String>, samples: Vec<Sample>) -> Self {
        Self {
            feature_names,
            samples,
        }
    }

    /// Return the feature column names from the CSV header.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the samples in file order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Consume the set, returning the samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// An unlabeled frame stream read by [`FrameReader`](crate::FrameReader).
///
/// `frames[i]` is the feature vector of the i-th frame in file order.
#[derive(Debug)]
pub struct FrameSequence {
    /// Feature column names from the CSV header.
    pub feature_names: Vec<String>,
    /// Frames in capture order.
    pub frames: Vec<Vec<f64>>,
}
