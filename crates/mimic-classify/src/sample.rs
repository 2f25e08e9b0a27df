//! Training samples, per-frame results and the bounded prediction history.

use std::collections::VecDeque;
use std::time::Instant;

use mimic_trees::{TrainingSet, TreeError};

/// Label returned when the classifier abstains.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Number of prediction records kept per classifier.
pub const HISTORY_CAPACITY: usize = 10;

/// One labeled pose feature vector.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    features: Vec<f64>,
    label: String,
}

impl Sample {
    /// Create a sample. Validation happens when a set of samples is trained on.
    #[must_use]
    pub fn new(features: Vec<f64>, label: impl Into<String>) -> Self {
        Self {
            features,
            label: label.into(),
        }
    }

    /// Return the feature vector.
    #[must_use]
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// Return the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Validate samples and encode them into a [`TrainingSet`].
///
/// # Errors
///
/// Returns the [`TreeError`] raised by [`TrainingSet::new`].
pub fn training_set(samples: &[Sample]) -> Result<TrainingSet, TreeError> {
    let rows = samples.iter().map(|s| s.features.clone()).collect();
    let labels = samples.iter().map(|s| s.label.clone()).collect();
    TrainingSet::new(rows, labels)
}

/// A gesture label with a confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    /// Predicted label, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Calibrated confidence; the raw model confidence for a
    /// below-threshold abstention.
    pub confidence: f64,
}

impl Classification {
    /// Create a classification.
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// An abstention carrying `confidence`.
    #[must_use]
    pub fn unknown(confidence: f64) -> Self {
        Self::new(UNKNOWN_LABEL, confidence)
    }

    /// Return `true` if this is an abstention.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// A scored frame before the threshold is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Index of the best class in the model's sorted class list.
    pub class: usize,
    /// Name of the best class.
    pub label: String,
    /// Model confidence before the anomaly discount.
    pub raw_confidence: f64,
    /// Confidence after the anomaly discount.
    pub confidence: f64,
    /// Anomaly score in [0, 1] against the best class's centroid.
    pub anomaly: f64,
}

impl Score {
    /// Apply the confidence threshold.
    ///
    /// The calibrated confidence is compared. Below the threshold the label
    /// becomes [`UNKNOWN_LABEL`] and the raw model confidence is reported.
    #[must_use]
    pub fn classify(&self, threshold: f64) -> Classification {
        if self.confidence >= threshold {
            Classification::new(self.label.clone(), self.confidence)
        } else {
            Classification::unknown(self.raw_confidence)
        }
    }
}

/// One entry of the prediction history.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// When the frame was classified.
    pub timestamp: Instant,
    /// Reported label.
    pub label: String,
    /// Reported confidence.
    pub confidence: f64,
    /// The frame's feature vector.
    pub features: Vec<f64>,
}

impl PredictionRecord {
    /// Record `result` for `features`, stamped now.
    #[must_use]
    pub fn new(result: &Classification, features: &[f64]) -> Self {
        Self {
            timestamp: Instant::now(),
            label: result.label.clone(),
            confidence: result.confidence,
            features: features.to_vec(),
        }
    }
}

/// Ring buffer of the most recent predictions, oldest evicted first.
#[derive(Debug, Clone)]
pub struct PredictionHistory {
    records: VecDeque<PredictionRecord>,
    capacity: usize,
}

impl PredictionHistory {
    /// Create an empty history holding at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&mut self, record: PredictionRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.iter()
    }

    /// Copy the records out, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<PredictionRecord> {
        self.records.iter().cloned().collect()
    }

    /// Return the newest record.
    #[must_use]
    pub fn latest(&self) -> Option<&PredictionRecord> {
        self.records.back()
    }

    /// Return the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Return `true` when no record is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Return the maximum number of records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}
