//! Confusion matrix with an abstention column, and per-class metrics.

use std::fmt;

use crate::error::TreeError;

/// A confusion matrix for multi-class classification with abstentions.
///
/// Entry `matrix[true_class][predicted_class]` counts how many samples with
/// true label `true_class` were predicted as `predicted_class`. The extra last
/// column counts samples for which the classifier answered "unknown".
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
    n_classes: usize,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / support. Unknown answers count against recall.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from true labels and optional predictions,
    /// where `None` means the classifier abstained.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyDataset`] | Zero labels provided |
    /// | [`TreeError::PredictionCountMismatch`] | Slices differ in length |
    /// | [`TreeError::ClassOutOfRange`] | A label or prediction is `>= n_classes` |
    pub fn from_predictions(
        true_labels: &[usize],
        predicted: &[Option<usize>],
        n_classes: usize,
    ) -> Result<Self, TreeError> {
        if true_labels.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        if true_labels.len() != predicted.len() {
            return Err(TreeError::PredictionCountMismatch {
                n_true: true_labels.len(),
                n_predicted: predicted.len(),
            });
        }
        let mut matrix = vec![vec![0usize; n_classes + 1]; n_classes];
        for (&t, &p) in true_labels.iter().zip(predicted) {
            if let Some(class) = [Some(t), p].into_iter().flatten().find(|&c| c >= n_classes) {
                return Err(TreeError::ClassOutOfRange { class, n_classes });
            }
            matrix[t][p.unwrap_or(n_classes)] += 1;
        }
        Ok(Self { matrix, n_classes })
    }

    /// Overall accuracy: proportion of correct predictions. Abstentions are wrong.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.n_classes).map(|i| self.matrix[i][i]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Fraction of samples for which the classifier answered "unknown".
    #[must_use]
    pub fn unknown_rate(&self) -> f64 {
        let unknown: usize = self.matrix.iter().map(|row| row[self.n_classes]).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            unknown as f64 / total as f64
        }
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..self.n_classes)
            .map(|c| {
                let tp = self.matrix[c][c];
                let fp: usize = (0..self.n_classes)
                    .filter(|&i| i != c)
                    .map(|i| self.matrix[i][c])
                    .sum();
                let support: usize = self.matrix[c].iter().sum();
                let precision = if tp + fp == 0 {
                    0.0
                } else {
                    tp as f64 / (tp + fp) as f64
                };
                let recall = if support == 0 {
                    0.0
                } else {
                    tp as f64 / support as f64
                };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Unweighted mean of per-class F1 over every class.
    #[must_use]
    pub fn macro_f1(&self) -> f64 {
        if self.n_classes == 0 {
            return 0.0;
        }
        self.class_metrics().iter().map(|m| m.f1).sum::<f64>() / self.n_classes as f64
    }

    /// Return the underlying matrix rows; each has `n_classes + 1` columns.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }

    /// Return the number of classes (excluding the unknown column).
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn total(&self) -> usize {
        self.matrix.iter().flat_map(|row| row.iter()).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "")?;
        for j in 0..self.n_classes {
            write!(f, " pred_{j:>3}")?;
        }
        writeln!(f, " {:>8}", "unknown")?;

        for (i, row) in self.matrix.iter().enumerate() {
            write!(f, "true_{i:>3}")?;
            for val in row {
                write!(f, " {val:>7}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
