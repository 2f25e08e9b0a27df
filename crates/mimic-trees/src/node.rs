use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node<L>>` arena, identifying a specific node in a tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a tree arena.
///
/// Trees are stored as `Vec<Node<L>>` where children are referenced by
/// [`NodeIndex`] rather than pointers. Every node has exactly one parent
/// (except the root at index 0), so the structure is acyclic by construction.
/// `L` is the leaf payload: [`ClassLeaf`] for classification trees,
/// [`ResidualLeaf`] for boosting rounds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node<L> {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Split quality mass: gain scaled by the fraction of root samples
        /// that reached this node.
        importance: f64,
        /// Number of training samples that reached this node.
        n_samples: usize,
    },
    /// A terminal leaf node.
    Leaf(L),
}

impl<L> Node<L> {
    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

/// Leaf payload of a classification tree.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassLeaf {
    /// Empirical class probability distribution, indexed by class.
    pub(crate) probabilities: Vec<f64>,
    /// Importance-weighted mean per-feature variance of the leaf's samples.
    pub(crate) sample_variance: f64,
    /// Number of training samples in this leaf.
    pub(crate) n_samples: usize,
}

impl ClassLeaf {
    /// Return the class probability distribution.
    #[must_use]
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Return the importance-weighted feature variance of the leaf's samples.
    #[must_use]
    pub fn sample_variance(&self) -> f64 {
        self.sample_variance
    }

    /// Return the number of training samples in this leaf.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the majority class (first on ties).
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        crate::predict::argmax(&self.probabilities)
    }
}

/// Leaf payload of a boosting round: the mean per-class residual.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResidualLeaf {
    /// Mean residual per class.
    pub(crate) values: Vec<f64>,
    /// Number of training samples in this leaf.
    pub(crate) n_samples: usize,
}

impl ResidualLeaf {
    /// Return the per-class residual values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Return the number of training samples in this leaf.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_index_roundtrip() {
        let fi = FeatureIndex::new(7);
        assert_eq!(fi.index(), 7);
        assert_eq!(format!("{fi}"), "7");
    }

    #[test]
    fn node_index_ordering() {
        let a = NodeIndex::new(10);
        let b = NodeIndex::new(20);
        assert!(a < b);
        assert_eq!(format!("{a}"), "10");
    }

    #[test]
    fn leaf_and_split_discriminated() {
        let leaf: Node<ClassLeaf> = Node::Leaf(ClassLeaf {
            probabilities: vec![0.25, 0.75],
            sample_variance: 0.0,
            n_samples: 4,
        });
        let split: Node<ClassLeaf> = Node::Split {
            feature: FeatureIndex::new(2),
            threshold: 0.5,
            left: NodeIndex::new(1),
            right: NodeIndex::new(2),
            importance: 0.3,
            n_samples: 8,
        };
        assert!(leaf.is_leaf());
        assert!(!split.is_leaf());
    }

    #[test]
    fn class_leaf_majority() {
        let leaf = ClassLeaf {
            probabilities: vec![0.2, 0.5, 0.3],
            sample_variance: 0.01,
            n_samples: 10,
        };
        assert_eq!(leaf.predicted_class(), 1);
        assert_eq!(leaf.n_samples(), 10);
    }
}
