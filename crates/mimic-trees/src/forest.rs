//! Bagged ensemble of entropy decision trees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::dataset::TrainingSet;
use crate::error::TreeError;
use crate::importance::normalize_by_max;
use crate::predict::ClassDistribution;
use crate::sampling::{bootstrap_sample, feature_subset, subset_size};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter                | Default |
/// |--------------------------|---------|
/// | `max_depth`              | 8       |
/// | `min_samples_per_leaf`   | 2       |
/// | `feature_sampling_ratio` | 0.7     |
/// | `importance_bias`        | 0.7     |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_depth: usize,
    pub(crate) min_samples_per_leaf: usize,
    pub(crate) feature_sampling_ratio: f64,
    pub(crate) importance_bias: f64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, TreeError> {
        if n_trees == 0 {
            return Err(TreeError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_depth: 8,
            min_samples_per_leaf: 2,
            feature_sampling_ratio: 0.7,
            importance_bias: 0.7,
        })
    }

    /// Set the maximum tree depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the sample count at or below which a node becomes a leaf.
    #[must_use]
    pub fn with_min_samples_per_leaf(mut self, min_samples_per_leaf: usize) -> Self {
        self.min_samples_per_leaf = min_samples_per_leaf;
        self
    }

    /// Set the fraction of features offered to each tree.
    #[must_use]
    pub fn with_feature_sampling_ratio(mut self, ratio: f64) -> Self {
        self.feature_sampling_ratio = ratio;
        self
    }

    /// Set the share of each feature subset reserved for the most important features.
    #[must_use]
    pub fn with_importance_bias(mut self, bias: f64) -> Self {
        self.importance_bias = bias;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the maximum depth limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the feature sampling ratio.
    #[must_use]
    pub fn feature_sampling_ratio(&self) -> f64 {
        self.feature_sampling_ratio
    }

    /// Train the forest, drawing all randomness from `rng`.
    ///
    /// Trees are built one after another. Each gets its own bootstrap
    /// resample (same size as `data`) and feature subset; once earlier trees
    /// have produced split gain, the subsets lean toward the features with
    /// the highest running importance.
    ///
    /// # Errors
    ///
    /// | Variant                                 | When                                   |
    /// |-----------------------------------------|----------------------------------------|
    /// | [`TreeError::InvalidTreeCount`]         | `n_trees` is zero                      |
    /// | [`TreeError::InvalidMaxDepth`]          | `max_depth` is zero                    |
    /// | [`TreeError::InvalidMinSamplesPerLeaf`] | `min_samples_per_leaf` is zero         |
    /// | [`TreeError::InvalidSamplingRatio`]     | ratio is not in (0.0, 1.0]             |
    /// | [`TreeError::InvalidImportanceBias`]    | bias is not in [0.0, 1.0]              |
    #[instrument(skip_all, fields(n_trees = self.n_trees, n_samples = data.n_samples()))]
    pub fn fit<R: Rng + ?Sized>(
        &self,
        data: &TrainingSet,
        rng: &mut R,
    ) -> Result<RandomForest, TreeError> {
        if self.n_trees == 0 {
            return Err(TreeError::InvalidTreeCount { n_trees: 0 });
        }
        if !(self.feature_sampling_ratio > 0.0 && self.feature_sampling_ratio <= 1.0) {
            return Err(TreeError::InvalidSamplingRatio {
                ratio: self.feature_sampling_ratio,
            });
        }
        if !(0.0..=1.0).contains(&self.importance_bias) {
            return Err(TreeError::InvalidImportanceBias {
                bias: self.importance_bias,
            });
        }
        let tree_config = DecisionTreeConfig::new()
            .with_max_depth(self.max_depth)
            .with_min_samples_per_leaf(self.min_samples_per_leaf);
        tree_config.validate()?;

        let n_samples = data.n_samples();
        let n_features = data.n_features();
        let k = subset_size(n_features, self.feature_sampling_ratio);

        info!(
            n_trees = self.n_trees,
            n_samples,
            n_features,
            n_classes = data.n_classes(),
            features_per_tree = k,
            "training random forest"
        );

        let mut trees = Vec::with_capacity(self.n_trees);
        let mut running_gains = vec![0.0f64; n_features];

        for tree_idx in 0..self.n_trees {
            let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.r#gen());

            let hints = importance_hints(&running_gains);
            let bootstrap = bootstrap_sample(n_samples, n_samples, &mut tree_rng);
            let features = feature_subset(
                n_features,
                k,
                hints.as_deref(),
                self.importance_bias,
                &mut tree_rng,
            );

            let tree = tree_config.fit_subset(data, &bootstrap, &features, hints.as_deref())?;

            for (total, gain) in running_gains.iter_mut().zip(tree.split_gains()) {
                *total += gain;
            }

            debug!(
                tree_idx,
                n_nodes = tree.n_nodes(),
                depth = tree.depth(),
                ?features,
                "forest tree built"
            );
            trees.push(tree);
        }

        info!(n_trees_trained = trees.len(), "random forest training complete");

        Ok(RandomForest {
            trees,
            n_features,
            n_classes: data.n_classes(),
        })
    }
}

/// Normalized running importance, or `None` while no tree has split yet.
fn importance_hints(running_gains: &[f64]) -> Option<Vec<f64>> {
    if running_gains.iter().all(|&g| g <= 0.0) {
        return None;
    }
    let mut hints = running_gains.to_vec();
    normalize_by_max(&mut hints);
    Some(hints)
}

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl RandomForest {
    /// Return the unweighted mean class distribution over all trees.
    ///
    /// Returns `None` for an empty forest.
    #[must_use]
    pub fn predict_proba(&self, sample: &[f64]) -> Option<ClassDistribution> {
        if self.trees.is_empty() {
            return None;
        }
        let mut avg = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in avg.iter_mut().zip(tree.predict_proba(sample)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        avg.iter_mut().for_each(|v| *v /= n);
        Some(ClassDistribution::new(avg))
    }

    /// Predict the class index (argmax of the averaged distribution).
    #[must_use]
    pub fn predict(&self, sample: &[f64]) -> Option<usize> {
        self.predict_proba(sample).map(|d| d.predicted_class())
    }

    /// Sum of split importance mass per feature over all trees.
    #[must_use]
    pub fn split_gains(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            for (total, gain) in totals.iter_mut().zip(tree.split_gains()) {
                *total += gain;
            }
        }
        totals
    }

    /// Return the fitted trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the total node count over all trees.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_nodes).sum()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// Three classes separated along feature 0; feature 1 is constant.
    fn make_separable_data() -> TrainingSet {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (class, offset) in [("a", 0.0), ("b", 10.0), ("c", 20.0)] {
            for i in 0..20 {
                rows.push(vec![offset + f64::from(i) * 0.15, 0.5]);
                labels.push(class.to_string());
            }
        }
        TrainingSet::new(rows, labels).unwrap()
    }

    #[test]
    fn three_class_separable_accuracy() {
        let data = make_separable_data();
        let forest = RandomForestConfig::new(15)
            .unwrap()
            .with_feature_sampling_ratio(1.0)
            .fit(&data, &mut ChaCha8Rng::seed_from_u64(42))
            .unwrap();

        let correct = data
            .rows()
            .iter()
            .zip(data.labels())
            .filter(|&(row, &label)| forest.predict(row) == Some(label))
            .count();
        let accuracy = correct as f64 / data.n_samples() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let data = make_separable_data();
        let config = RandomForestConfig::new(8).unwrap();
        let f1 = config.fit(&data, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        let f2 = config.fit(&data, &mut ChaCha8Rng::seed_from_u64(99)).unwrap();
        for row in data.rows() {
            assert_eq!(f1.predict_proba(row), f2.predict_proba(row));
        }
    }

    #[test]
    fn probabilities_average_to_one() {
        let data = make_separable_data();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&data, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap();
        let dist = forest.predict_proba(&[5.0, 0.5]).unwrap();
        let sum: f64 = dist.as_slice().iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
        assert_eq!(dist.n_classes(), 3);
    }

    #[test]
    fn constant_feature_gets_no_gain() {
        let data = make_separable_data();
        let forest = RandomForestConfig::new(10)
            .unwrap()
            .with_feature_sampling_ratio(1.0)
            .fit(&data, &mut ChaCha8Rng::seed_from_u64(7))
            .unwrap();
        let gains = forest.split_gains();
        assert!(gains[0] > 0.0);
        assert_eq!(gains[1], 0.0);
    }

    #[test]
    fn empty_forest_predicts_none() {
        let forest = RandomForest {
            trees: Vec::new(),
            n_features: 2,
            n_classes: 2,
        };
        assert!(forest.predict_proba(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn invalid_tree_count_error() {
        assert!(matches!(
            RandomForestConfig::new(0),
            Err(TreeError::InvalidTreeCount { n_trees: 0 })
        ));
    }

    #[test]
    fn invalid_ratio_error() {
        let data = make_separable_data();
        let err = RandomForestConfig::new(3)
            .unwrap()
            .with_feature_sampling_ratio(0.0)
            .fit(&data, &mut ChaCha8Rng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidSamplingRatio { .. }));
    }
}
