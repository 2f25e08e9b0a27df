use tracing::{debug, instrument};

use crate::{
    TreeError,
    dataset::TrainingSet,
    node::{ClassLeaf, Node, NodeIndex},
    split::find_best_split,
};

/// An arena-based tree.
///
/// Stored as a `Vec<Node<L>>` with index references; the root is at index 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tree<L> {
    pub(crate) nodes: Vec<Node<L>>,
    pub(crate) n_features: usize,
}

/// A fitted entropy classification tree.
pub type DecisionTree = Tree<ClassLeaf>;

impl<L> Tree<L> {
    /// Traverse from the root and return the leaf payload reached by `sample`.
    ///
    /// Goes left when `sample[feature] <= threshold`. A feature index past the
    /// end of `sample` also goes left, so traversal is total for short inputs.
    #[must_use]
    pub fn leaf(&self, sample: &[f64]) -> &L {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(leaf) => return leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = match sample.get(feature.index()) {
                        Some(value) if *value > *threshold => right.index(),
                        _ => left.index(),
                    };
                }
            }
        }
    }

    /// Return the arena nodes; the root is at index 0.
    #[must_use]
    pub fn nodes(&self) -> &[Node<L>] {
        &self.nodes
    }

    /// Return the number of features the tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    /// Uses an iterative BFS approach.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf(_) => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    /// Accumulate split importance mass per feature.
    ///
    /// Returns a `Vec` of length `n_features`; all zeros when the tree is a
    /// single leaf. Not normalized.
    #[must_use]
    pub fn split_gains(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature, importance, ..
            } = node
                && let Some(slot) = totals.get_mut(feature.index())
            {
                *slot += importance;
            }
        }
        totals
    }
}

impl DecisionTree {
    /// Return the class probability distribution for a single sample.
    #[must_use]
    pub fn predict_proba(&self, sample: &[f64]) -> &[f64] {
        self.leaf(sample).probabilities()
    }

    /// Predict the class index for a single sample.
    #[must_use]
    pub fn predict(&self, sample: &[f64]) -> usize {
        self.leaf(sample).predicted_class()
    }
}

/// Configuration for a single entropy decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter              | Default |
/// |------------------------|---------|
/// | `max_depth`            | 8       |
/// | `min_samples_per_leaf` | 2       |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) max_depth: usize,
    pub(crate) min_samples_per_leaf: usize,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: 8,
            min_samples_per_leaf: 2,
        }
    }

    /// Set the maximum tree depth (root is depth 0).
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

    /// Return the maximum depth limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the leaf sample-count limit.
    #[must_use]
    pub fn min_samples_per_leaf(&self) -> usize {
        self.min_samples_per_leaf
    }

    /// Check the configuration values.
    ///
    /// # Errors
    ///
    /// | Variant                                | When                        |
    /// |----------------------------------------|-----------------------------|
    /// | [`TreeError::InvalidMaxDepth`]         | `max_depth` is 0            |
    /// | [`TreeError::InvalidMinSamplesPerLeaf`]| `min_samples_per_leaf` is 0 |
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.max_depth == 0 {
            return Err(TreeError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_per_leaf == 0 {
            return Err(TreeError::InvalidMinSamplesPerLeaf {
                min_samples_per_leaf: 0,
            });
        }
        Ok(())
    }

    /// Train a tree on every sample and every feature of `data`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DecisionTreeConfig::validate`].
    pub fn fit(&self, data: &TrainingSet) -> Result<DecisionTree, TreeError> {
        let features: Vec<usize> = (0..data.n_features()).collect();
        self.fit_subset(data, &data.all_indices(), &features, None)
    }

    /// Train a tree on a (possibly repeating) sample subset and a feature subset.
    ///
    /// `importance_hints` are normalized per-feature importances in [0, 1]:
    /// high-importance features get finer thresholds and leaf variance is
    /// weighted by them. Pass `None` when importance is not known yet.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DecisionTreeConfig::validate`].
    #[instrument(skip_all, fields(n_samples = sample_indices.len(), n_features = features.len()))]
    pub fn fit_subset(
        &self,
        data: &TrainingSet,
        sample_indices: &[usize],
        features: &[usize],
        importance_hints: Option<&[f64]>,
    ) -> Result<DecisionTree, TreeError> {
        self.validate()?;

        let mut builder = Builder {
            data,
            config: self,
            features,
            importance_hints,
            n_root: sample_indices.len().max(1),
            arena: Vec::new(),
        };
        builder.build(sample_indices, 0);

        debug!(
            n_nodes = builder.arena.len(),
            "decision tree built"
        );

        Ok(Tree {
            nodes: builder.arena,
            n_features: data.n_features(),
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursive arena builder for classification trees.
struct Builder<'a> {
    data: &'a TrainingSet,
    config: &'a DecisionTreeConfig,
    features: &'a [usize],
    importance_hints: Option<&'a [f64]>,
    n_root: usize,
    arena: Vec<Node<ClassLeaf>>,
}

impl Builder<'_> {
    /// Build the subtree for `sample_indices` and return its arena index.
    fn build(&mut self, sample_indices: &[usize], depth: usize) -> NodeIndex {
        let n_samples = sample_indices.len();
        let class_counts = self.data.class_counts(sample_indices);
        let n_present = class_counts.iter().filter(|&&c| c > 0).count();

        if depth >= self.config.max_depth
            || n_samples <= self.config.min_samples_per_leaf
            || n_present <= 1
            || self.features.is_empty()
        {
            return self.push_leaf(sample_indices, &class_counts);
        }

        let Some(split) = find_best_split(
            self.data.columns(),
            self.data.labels(),
            sample_indices,
            self.data.n_classes(),
            self.features,
            self.importance_hints,
        ) else {
            return self.push_leaf(sample_indices, &class_counts);
        };

        // Arena pattern: reserve index, recurse, then overwrite with the split.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf(ClassLeaf {
            probabilities: Vec::new(),
            sample_variance: 0.0,
            n_samples,
        }));

        let left = self.build(&split.left_indices, depth + 1);
        let right = self.build(&split.right_indices, depth + 1);

        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            importance: split.gain * n_samples as f64 / self.n_root as f64,
            n_samples,
        };

        NodeIndex::new(node_idx)
    }

    fn push_leaf(&mut self, sample_indices: &[usize], class_counts: &[usize]) -> NodeIndex {
        let total = sample_indices.len().max(1) as f64;
        let probabilities = class_counts.iter().map(|&c| c as f64 / total).collect();
        let sample_variance = weighted_variance(self.data, sample_indices, self.importance_hints);
        let idx = self.arena.len();
        self.arena.push(Node::Leaf(ClassLeaf {
            probabilities,
            sample_variance,
            n_samples: sample_indices.len(),
        }));
        NodeIndex::new(idx)
    }
}

/// Importance-weighted mean of the per-feature population variance over `sample_indices`.
///
/// Uniform weights when no hints are given or all hints are zero.
pub(crate) fn weighted_variance(
    data: &TrainingSet,
    sample_indices: &[usize],
    importance_hints: Option<&[f64]>,
) -> f64 {
    if sample_indices.len() < 2 {
        return 0.0;
    }
    let n = sample_indices.len() as f64;
    let hint_total: f64 = importance_hints.map_or(0.0, |h| h.iter().sum());

    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for feat_idx in 0..data.n_features() {
        let weight = match importance_hints {
            Some(hints) if hint_total > 0.0 => hints.get(feat_idx).copied().unwrap_or(0.0),
            _ => 1.0,
        };
        if weight <= 0.0 {
            continue;
        }
        let column = data.column(feat_idx);
        let mean = sample_indices.iter().map(|&si| column[si]).sum::<f64>() / n;
        let var = sample_indices
            .iter()
            .map(|&si| (column[si] - mean).powi(2))
            .sum::<f64>()
            / n;
        weighted += weight * var;
        weight_sum += weight;
    }

    if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 }
}
