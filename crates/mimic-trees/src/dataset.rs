//! Validated, label-encoded training matrix shared by every tree builder.

use std::collections::BTreeSet;

use crate::error::TreeError;

/// A validated training set.
///
/// Rows are kept in both row-major (`rows[sample][feature]`) and column-major
/// (`columns[feature][sample]`) layouts: split search scans columns, anomaly
/// and leaf statistics read rows. Labels are encoded as indices into the
/// sorted list of distinct class names, so class order is stable across runs.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    rows: Vec<Vec<f64>>,
    columns: Vec<Vec<f64>>,
    labels: Vec<usize>,
    classes: Vec<String>,
    n_features: usize,
}

impl TrainingSet {
    /// Validate and encode a labeled dataset.
    ///
    /// # Errors
    ///
    /// | Variant                              | When                                    |
    /// |--------------------------------------|-----------------------------------------|
    /// | [`TreeError::EmptyDataset`]          | `rows` is empty                         |
    /// | [`TreeError::LabelCountMismatch`]    | `labels.len() != rows.len()`            |
    /// | [`TreeError::ZeroFeatures`]          | rows have zero feature columns          |
    /// | [`TreeError::FeatureCountMismatch`]  | rows have inconsistent lengths          |
    /// | [`TreeError::NonFiniteValue`]        | any value is NaN or infinite            |
    /// | [`TreeError::EmptyLabel`]            | any label is the empty string           |
    pub fn new(rows: Vec<Vec<f64>>, labels: Vec<String>) -> Result<Self, TreeError> {
        if rows.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        if labels.len() != rows.len() {
            return Err(TreeError::LabelCountMismatch {
                n_rows: rows.len(),
                n_labels: labels.len(),
            });
        }

        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(TreeError::ZeroFeatures);
        }

        for (sample_index, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(TreeError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
                return Err(TreeError::NonFiniteValue {
                    sample_index,
                    feature_index,
                });
            }
        }

        if let Some(sample_index) = labels.iter().position(String::is_empty) {
            return Err(TreeError::EmptyLabel { sample_index });
        }

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encoded: Vec<usize> = labels
            .iter()
            .map(|label| {
                classes
                    .binary_search(label)
                    .unwrap_or_default()
            })
            .collect();

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| rows.iter().map(|row| row[feat_idx]).collect())
            .collect();

        Ok(Self {
            rows,
            columns,
            labels: encoded,
            classes,
            n_features,
        })
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of distinct classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Return the sorted distinct class names; a class index points into this slice.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Return the class index for a label, if the label was seen in training.
    #[must_use]
    pub fn class_index(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    /// Return the encoded label of every sample.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Return the row-major feature matrix.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Return one feature column (all samples).
    #[must_use]
    pub fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }

    /// Return the column-major feature matrix.
    #[must_use]
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Count samples per class among `indices` (indices may repeat).
    #[must_use]
    pub fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &si in indices {
            counts[self.labels[si]] += 1;
        }
        counts
    }

    /// Return `0..n_samples`.
    #[must_use]
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.rows.len()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classes_are_sorted_and_encoded() {
        let set = TrainingSet::new(
            vec![vec![1.0], vec![2.0], vec![3.0]],
            labels(&["wave", "clap", "wave"]),
        )
        .unwrap();
        assert_eq!(set.classes(), &["clap".to_string(), "wave".to_string()]);
        assert_eq!(set.labels(), &[1, 0, 1]);
        assert_eq!(set.class_index("wave"), Some(1));
        assert_eq!(set.class_index("jump"), None);
    }

    #[test]
    fn columns_mirror_rows() {
        let set = TrainingSet::new(
            vec![vec![1.0, 10.0], vec![2.0, 20.0]],
            labels(&["a", "b"]),
        )
        .unwrap();
        assert_eq!(set.column(1), &[10.0, 20.0]);
        assert_eq!(set.n_features(), 2);
    }

    #[test]
    fn empty_dataset_rejected() {
        let err = TrainingSet::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, TreeError::EmptyDataset));
    }

    #[test]
    fn zero_features_rejected() {
        let err = TrainingSet::new(vec![vec![]], labels(&["a"])).unwrap_err();
        assert!(matches!(err, TreeError::ZeroFeatures));
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = TrainingSet::new(vec![vec![1.0, 2.0], vec![3.0]], labels(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::FeatureCountMismatch {
                expected: 2,
                got: 1,
                sample_index: 1
            }
        ));
    }

    #[test]
    fn non_finite_rejected() {
        let err = TrainingSet::new(vec![vec![1.0, f64::NAN]], labels(&["a"])).unwrap_err();
        assert!(matches!(
            err,
            TreeError::NonFiniteValue {
                sample_index: 0,
                feature_index: 1
            }
        ));
    }

    #[test]
    fn empty_label_rejected() {
        let err = TrainingSet::new(vec![vec![1.0], vec![2.0]], labels(&["a", ""])).unwrap_err();
        assert!(matches!(err, TreeError::EmptyLabel { sample_index: 1 }));
    }

    #[test]
    fn label_count_mismatch_rejected() {
        let err = TrainingSet::new(vec![vec![1.0], vec![2.0]], labels(&["a"])).unwrap_err();
        assert!(matches!(err, TreeError::LabelCountMismatch { n_rows: 2, n_labels: 1 }));
    }

    #[test]
    fn class_counts_follow_repeated_indices() {
        let set = TrainingSet::new(
            vec![vec![1.0], vec![2.0], vec![3.0]],
            labels(&["a", "b", "b"]),
        )
        .unwrap();
        assert_eq!(set.class_counts(&[0, 0, 2]), vec![2, 1]);
    }
}
