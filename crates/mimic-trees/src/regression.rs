//! Multi-output regression trees fitted to per-class residuals.

use crate::node::{FeatureIndex, Node, NodeIndex, ResidualLeaf};
use crate::split::{candidate_thresholds, partition, side_is_large_enough};
use crate::tree::Tree;

/// Minimum mean-squared-error reduction for a residual split to be accepted.
pub const BOOST_EPSILON: f64 = 1e-7;

/// Minimum fraction of the round's samples each side of a residual split must hold.
pub const MIN_RESIDUAL_SIDE_FRACTION: f64 = 0.10;

/// A fitted residual tree; leaves hold mean residual vectors.
pub type ResidualTree = Tree<ResidualLeaf>;

/// Running per-class sums used to score a residual partition.
#[derive(Clone)]
struct Moments {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    n: usize,
}

impl Moments {
    fn zeros(n_outputs: usize) -> Self {
        Self {
            sum: vec![0.0; n_outputs],
            sum_sq: vec![0.0; n_outputs],
            n: 0,
        }
    }

    fn add(&mut self, target: &[f64]) {
        for ((s, sq), &r) in self.sum.iter_mut().zip(&mut self.sum_sq).zip(target) {
            *s += r;
            *sq += r * r;
        }
        self.n += 1;
    }

    fn minus(&self, other: &Self) -> Self {
        Self {
            sum: self.sum.iter().zip(&other.sum).map(|(a, b)| a - b).collect(),
            sum_sq: self.sum_sq.iter().zip(&other.sum_sq).map(|(a, b)| a - b).collect(),
            n: self.n - other.n,
        }
    }

    /// Sum of squared deviations from the mean, summed over outputs.
    fn sse(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        self.sum
            .iter()
            .zip(&self.sum_sq)
            .map(|(&s, &sq)| (sq - s * s / n).max(0.0))
            .sum()
    }
}

/// Grows one residual tree over every sample and every feature.
///
/// `columns` is column-major (`columns[feature][sample]`), `targets` is
/// row-major (`targets[sample][class]`). Splits minimize the summed per-class
/// squared error; a split whose MSE reduction is at most [`BOOST_EPSILON`]
/// or that leaves less than [`MIN_RESIDUAL_SIDE_FRACTION`] of all samples on
/// either side is not taken.
pub(crate) fn fit_residual_tree(
    columns: &[Vec<f64>],
    targets: &[Vec<f64>],
    max_depth: usize,
    min_samples_per_leaf: usize,
) -> ResidualTree {
    let n_samples = targets.len();
    let n_outputs = targets.first().map_or(0, Vec::len);
    let mut builder = ResidualBuilder {
        columns,
        targets,
        n_outputs,
        max_depth,
        min_samples_per_leaf,
        n_root: n_samples.max(1),
        arena: Vec::new(),
    };
    let all: Vec<usize> = (0..n_samples).collect();
    builder.build(&all, 0);
    Tree {
        nodes: builder.arena,
        n_features: columns.len(),
    }
}

struct ResidualBuilder<'a> {
    columns: &'a [Vec<f64>],
    targets: &'a [Vec<f64>],
    n_outputs: usize,
    max_depth: usize,
    min_samples_per_leaf: usize,
    n_root: usize,
    arena: Vec<Node<ResidualLeaf>>,
}

struct ResidualSplit {
    feature: usize,
    threshold: f64,
    reduction: f64,
}

impl ResidualBuilder<'_> {
    fn moments(&self, sample_indices: &[usize]) -> Moments {
        let mut m = Moments::zeros(self.n_outputs);
        for &si in sample_indices {
            m.add(&self.targets[si]);
        }
        m
    }

    fn build(&mut self, sample_indices: &[usize], depth: usize) -> NodeIndex {
        let parent = self.moments(sample_indices);

        if depth >= self.max_depth || sample_indices.len() <= self.min_samples_per_leaf {
            return self.push_leaf(&parent);
        }
        let Some(split) = self.best_split(sample_indices, &parent) else {
            return self.push_leaf(&parent);
        };

        let (left_indices, right_indices) =
            partition(&self.columns[split.feature], sample_indices, split.threshold);

        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf(ResidualLeaf {
            values: Vec::new(),
            n_samples: parent.n,
        }));

        let left = self.build(&left_indices, depth + 1);
        let right = self.build(&right_indices, depth + 1);

        self.arena[node_idx] = Node::Split {
            feature: FeatureIndex::new(split.feature),
            threshold: split.threshold,
            left,
            right,
            importance: split.reduction * parent.n as f64 / self.n_root as f64,
            n_samples: parent.n,
        };
        NodeIndex::new(node_idx)
    }

    fn best_split(&self, sample_indices: &[usize], parent: &Moments) -> Option<ResidualSplit> {
        let n = sample_indices.len();
        if n < 2 {
            return None;
        }
        let parent_sse = parent.sse();
        let mut best: Option<ResidualSplit> = None;
        let mut best_reduction = BOOST_EPSILON;

        for (feat_idx, column) in self.columns.iter().enumerate() {
            for threshold in candidate_thresholds(column, sample_indices, false) {
                let mut left = Moments::zeros(self.n_outputs);
                for &si in sample_indices {
                    if column[si] <= threshold {
                        left.add(&self.targets[si]);
                    }
                }
                if !side_is_large_enough(left.n, self.n_root, MIN_RESIDUAL_SIDE_FRACTION)
                    || !side_is_large_enough(n - left.n, self.n_root, MIN_RESIDUAL_SIDE_FRACTION)
                {
                    continue;
                }
                let right = parent.minus(&left);
                let reduction = (parent_sse - left.sse() - right.sse()) / n as f64;
                if reduction > best_reduction {
                    best_reduction = reduction;
                    best = Some(ResidualSplit {
                        feature: feat_idx,
                        threshold,
                        reduction,
                    });
                }
            }
        }
        best
    }

    fn push_leaf(&mut self, moments: &Moments) -> NodeIndex {
        let n = moments.n.max(1) as f64;
        let values = moments.sum.iter().map(|s| s / n).collect();
        let idx = self.arena.len();
        self.arena.push(Node::Leaf(ResidualLeaf {
            values,
            n_samples: moments.n,
        }));
        NodeIndex::new(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_residual_is_split_once() {
        // Class-0 residual is +1 on the left half and -1 on the right half.
        let columns = vec![(0..12).map(f64::from).collect::<Vec<_>>()];
        let targets: Vec<Vec<f64>> = (0..12)
            .map(|i| if i < 6 { vec![1.0, -1.0] } else { vec![-1.0, 1.0] })
            .collect();
        let tree = fit_residual_tree(&columns, &targets, 4, 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.leaf(&[3.0]).values(), &[1.0, -1.0]);
        assert_eq!(tree.leaf(&[9.0]).values(), &[-1.0, 1.0]);
        // Full reduction: parent MSE is 2.0 (1.0 per output), children are pure.
        assert!((tree.split_gains()[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn constant_residual_is_a_single_leaf() {
        let columns = vec![(0..10).map(f64::from).collect::<Vec<_>>()];
        let targets = vec![vec![0.25, -0.25]; 10];
        let tree = fit_residual_tree(&columns, &targets, 4, 2);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.leaf(&[0.0]).values(), &[0.25, -0.25]);
    }

    #[test]
    fn small_side_is_rejected() {
        // Isolating the outlier would leave 1 of 20 samples (5%) on one side.
        let columns = vec![(0..20).map(f64::from).collect::<Vec<_>>()];
        let targets: Vec<Vec<f64>> = (0..20)
            .map(|i| if i == 19 { vec![5.0] } else { vec![0.0] })
            .collect();
        let tree = fit_residual_tree(&columns, &targets, 4, 1);
        assert!(tree.leaf(&[19.0]).n_samples() >= 2);
    }

    #[test]
    fn depth_limit_is_respected() {
        let columns = vec![(0..64).map(f64::from).collect::<Vec<_>>()];
        let targets: Vec<Vec<f64>> = (0..64).map(|i| vec![f64::from(i)]).collect();
        let tree = fit_residual_tree(&columns, &targets, 2, 1);
        assert!(tree.depth() <= 2);
    }
}
