//! Gradient-boosted residual trees over a softmax of per-class scores.

use tracing::{debug, info, instrument};

use crate::dataset::TrainingSet;
use crate::error::TreeError;
use crate::predict::{ClassDistribution, floored_ln, softmax_in_place};
use crate::regression::{ResidualTree, fit_residual_tree};

/// Configuration for gradient boosting.
///
/// # Defaults
///
/// | Parameter              | Default |
/// |------------------------|---------|
/// | `n_rounds`             | 10      |
/// | `max_depth`            | 4       |
/// | `min_samples_per_leaf` | 2       |
/// | `learning_rate`        | 0.1     |
#[derive(Debug, Clone)]
pub struct GradientBoostingConfig {
    pub(crate) n_rounds: usize,
    pub(crate) max_depth: usize,
    pub(crate) min_samples_per_leaf: usize,
    pub(crate) learning_rate: f64,
}

impl GradientBoostingConfig {
    /// Create a config running `n_rounds` boosting rounds. Zero rounds is valid
    /// and yields a model that leaves forest probabilities unchanged.
    #[must_use]
    pub fn new(n_rounds: usize) -> Self {
        Self {
            n_rounds,
            max_depth: 4,
            min_samples_per_leaf: 2,
            learning_rate: 0.1,
        }
    }

    /// Derive the residual-tree depth from a forest depth: `max(1, depth / 2)`.
    #[must_use]
    pub fn with_forest_depth(mut self, forest_depth: usize) -> Self {
        self.max_depth = (forest_depth / 2).max(1);
        self
    }

    /// Set the residual-tree depth directly.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the sample count at or below which a residual node becomes a leaf.
    #[must_use]
    pub fn with_min_samples_per_leaf(mut self, min_samples_per_leaf: usize) -> Self {
        self.min_samples_per_leaf = min_samples_per_leaf;
        self
    }

    /// Set the shrinkage applied to every tree output.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Return the number of boosting rounds.
    #[must_use]
    pub fn n_rounds(&self) -> usize {
        self.n_rounds
    }

    /// Return the residual-tree depth limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Fit the boosting rounds on every sample and every feature of `data`.
    ///
    /// # Errors
    ///
    /// | Variant                                 | When                              |
    /// |-----------------------------------------|-----------------------------------|
    /// | [`TreeError::InvalidLearningRate`]      | `learning_rate` is not in (0, 1)  |
    /// | [`TreeError::InvalidMaxDepth`]          | `max_depth` is zero               |
    /// | [`TreeError::InvalidMinSamplesPerLeaf`] | `min_samples_per_leaf` is zero    |
    #[instrument(skip_all, fields(n_rounds = self.n_rounds, n_samples = data.n_samples()))]
    pub fn fit(&self, data: &TrainingSet) -> Result<GradientBoostedTrees, TreeError> {
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return Err(TreeError::InvalidLearningRate {
                learning_rate: self.learning_rate,
            });
        }
        if self.max_depth == 0 {
            return Err(TreeError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_per_leaf == 0 {
            return Err(TreeError::InvalidMinSamplesPerLeaf {
                min_samples_per_leaf: 0,
            });
        }

        let n_samples = data.n_samples();
        let n_classes = data.n_classes();
        let counts = data.class_counts(&data.all_indices());
        let initial_scores: Vec<f64> = counts
            .iter()
            .map(|&c| floored_ln(c as f64 / n_samples.max(1) as f64))
            .collect();

        info!(
            n_rounds = self.n_rounds,
            n_samples,
            n_classes,
            max_depth = self.max_depth,
            "training gradient-boosted trees"
        );

        let mut scores = vec![initial_scores.clone(); n_samples];
        let mut trees = Vec::with_capacity(self.n_rounds);

        for round in 0..self.n_rounds {
            let residuals: Vec<Vec<f64>> = scores
                .iter()
                .zip(data.labels())
                .map(|(f, &label)| {
                    let mut p = f.clone();
                    softmax_in_place(&mut p);
                    p.iter()
                        .enumerate()
                        .map(|(c, &pc)| if c == label { 1.0 - pc } else { -pc })
                        .collect()
                })
                .collect();

            let tree = fit_residual_tree(
                data.columns(),
                &residuals,
                self.max_depth,
                self.min_samples_per_leaf,
            );

            for (f, row) in scores.iter_mut().zip(data.rows()) {
                for (fc, &out) in f.iter_mut().zip(tree.leaf(row).values()) {
                    *fc += self.learning_rate * out;
                }
            }

            debug!(round, n_nodes = tree.n_nodes(), depth = tree.depth(), "boosting round fitted");
            trees.push(tree);
        }

        info!(n_rounds_trained = trees.len(), "gradient boosting complete");

        Ok(GradientBoostedTrees {
            trees,
            learning_rate: self.learning_rate,
            n_classes,
            n_features: data.n_features(),
            initial_scores,
        })
    }
}

/// A fitted sequence of residual trees.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GradientBoostedTrees {
    pub(crate) trees: Vec<ResidualTree>,
    pub(crate) learning_rate: f64,
    pub(crate) n_classes: usize,
    pub(crate) n_features: usize,
    pub(crate) initial_scores: Vec<f64>,
}

impl GradientBoostedTrees {
    /// Sum of all tree outputs per class, before the learning rate is applied.
    #[must_use]
    pub fn raw_update(&self, sample: &[f64]) -> Vec<f64> {
        let mut total = vec![0.0f64; self.n_classes];
        for tree in &self.trees {
            for (t, v) in total.iter_mut().zip(tree.leaf(sample).values()) {
                *t += v;
            }
        }
        total
    }

    /// Standalone boosted distribution: `softmax(F₀ + lr × Σ tree(x))`.
    #[must_use]
    pub fn predict_proba(&self, sample: &[f64]) -> ClassDistribution {
        let logits = self
            .initial_scores
            .iter()
            .zip(self.raw_update(sample))
            .map(|(f0, u)| f0 + self.learning_rate * u)
            .collect();
        ClassDistribution::from_logits(logits)
    }

    /// Combine a forest distribution with the boosted update.
    ///
    /// `logit[c] = ln(max(p_forest[c], 1e-9)) + lr × Σ tree[c](x)`, then softmax.
    #[must_use]
    pub fn combine(&self, forest_proba: &[f64], sample: &[f64]) -> ClassDistribution {
        let logits = forest_proba
            .iter()
            .zip(self.raw_update(sample))
            .map(|(&p, u)| floored_ln(p) + self.learning_rate * u)
            .collect();
        ClassDistribution::from_logits(logits)
    }

    /// Sum of split MSE-reduction mass per feature over all rounds.
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

    /// Return the fitted residual trees in round order.
    #[must_use]
    pub fn trees(&self) -> &[ResidualTree] {
        &self.trees
    }

    /// Return the number of boosting rounds kept.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the total node count over all rounds.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(ResidualTree::n_nodes).sum()
    }

    /// Return the learning rate used during training.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the class log-prior scores the boosting started from.
    #[must_use]
    pub fn initial_scores(&self) -> &[f64] {
        &self.initial_scores
    }
}
