//! Entropy split search for classification trees.

use crate::node::FeatureIndex;

/// Minimum information gain (bits) for a split to be accepted.
pub const GAIN_EPSILON: f64 = 1e-6;

/// Minimum fraction of a node's samples each side of a split must hold.
pub const MIN_SIDE_FRACTION: f64 = 0.05;

/// Maximum number of evenly spaced distinct values tried as thresholds.
pub const MAX_EVEN_THRESHOLDS: usize = 12;

/// Maximum number of midpoint thresholds added for high-importance features.
pub const MAX_MIDPOINT_THRESHOLDS: usize = 48;

/// Normalized importance at or above which a feature gets midpoint thresholds.
pub const HIGH_IMPORTANCE_CUTOFF: f64 = 0.5;

/// Shannon entropy in bits: `-Σ p_i · log2(p_i)` over non-empty classes.
///
/// Returns 0.0 when `n_samples` is zero.
#[must_use]
pub fn entropy(class_counts: &[usize], n_samples: usize) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    let n = n_samples as f64;
    -class_counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Whether a partition side is large enough relative to its parent.
pub(crate) fn side_is_large_enough(n_side: usize, n_parent: usize, min_fraction: f64) -> bool {
    n_side > 0 && (n_side as f64) >= min_fraction * n_parent as f64
}

/// Pick up to `max` items spread evenly over `items`, keeping the first and last.
fn evenly_spaced(items: &[f64], max: usize) -> Vec<f64> {
    if items.len() <= max {
        return items.to_vec();
    }
    if max <= 1 {
        return items.first().copied().into_iter().collect();
    }
    let last = (items.len() - 1) as f64;
    let mut picked: Vec<f64> = (0..max)
        .map(|i| items[((i as f64) * last / (max - 1) as f64).round() as usize])
        .collect();
    picked.dedup();
    picked
}

/// Candidate thresholds for one feature column restricted to `sample_indices`.
///
/// Up to [`MAX_EVEN_THRESHOLDS`] evenly spaced distinct values (the largest
/// distinct value is excluded: it would send every sample left). With
/// `refine`, midpoints between consecutive distinct values are added, capped
/// at [`MAX_MIDPOINT_THRESHOLDS`]. Returned sorted and deduplicated.
pub(crate) fn candidate_thresholds(column: &[f64], sample_indices: &[usize], refine: bool) -> Vec<f64> {
    let mut distinct: Vec<f64> = sample_indices.iter().map(|&si| column[si]).collect();
    distinct.sort_unstable_by(|a, b| a.total_cmp(b));
    distinct.dedup();

    if distinct.len() < 2 {
        return Vec::new();
    }

    let usable = &distinct[..distinct.len() - 1];
    let mut thresholds = evenly_spaced(usable, MAX_EVEN_THRESHOLDS);

    if refine {
        let midpoints: Vec<f64> = distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        thresholds.extend(evenly_spaced(&midpoints, MAX_MIDPOINT_THRESHOLDS));
        thresholds.sort_unstable_by(|a, b| a.total_cmp(b));
        thresholds.dedup();
    }

    thresholds
}

/// Split `sample_indices` by `column[si] <= threshold`.
pub(crate) fn partition(column: &[f64], sample_indices: &[usize], threshold: f64) -> (Vec<usize>, Vec<usize>) {
    let mut left = Vec::with_capacity(sample_indices.len() / 2);
    let mut right = Vec::with_capacity(sample_indices.len() / 2);
    for &si in sample_indices {
        if column[si] <= threshold {
            left.push(si);
        } else {
            right.push(si);
        }
    }
    (left, right)
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Information gain in bits.
    pub(crate) gain: f64,
    /// Sample indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the maximum-gain split over `features`.
///
/// Features are scanned in the order given and thresholds in ascending
/// order; a later candidate only wins with strictly greater gain, so ties go
/// to the first encountered. Splits leaving either side with less than
/// [`MIN_SIDE_FRACTION`] of the samples are rejected. Returns `None` when no
/// split has gain above [`GAIN_EPSILON`].
///
/// `columns` is column-major: `columns[feature_idx][sample_idx]`.
pub(crate) fn find_best_split(
    columns: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    n_classes: usize,
    features: &[usize],
    importance_hints: Option<&[f64]>,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples < 2 || features.is_empty() {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &si in sample_indices {
        parent_counts[labels[si]] += 1;
    }
    let parent_entropy = entropy(&parent_counts, n_samples);

    let mut best_gain = GAIN_EPSILON;
    let mut best: Option<(usize, f64)> = None;
    let mut left_counts = vec![0usize; n_classes];

    for &feat_idx in features {
        let column = &columns[feat_idx];
        let refine = importance_hints
            .and_then(|h| h.get(feat_idx))
            .is_some_and(|&imp| imp >= HIGH_IMPORTANCE_CUTOFF);

        for threshold in candidate_thresholds(column, sample_indices, refine) {
            left_counts.iter_mut().for_each(|c| *c = 0);
            let mut n_left = 0usize;
            for &si in sample_indices {
                if column[si] <= threshold {
                    left_counts[labels[si]] += 1;
                    n_left += 1;
                }
            }
            let n_right = n_samples - n_left;

            if !side_is_large_enough(n_left, n_samples, MIN_SIDE_FRACTION)
                || !side_is_large_enough(n_right, n_samples, MIN_SIDE_FRACTION)
            {
                continue;
            }

            let right_counts: Vec<usize> = parent_counts
                .iter()
                .zip(&left_counts)
                .map(|(&p, &l)| p - l)
                .collect();

            let n = n_samples as f64;
            let gain = parent_entropy
                - (n_left as f64 / n) * entropy(&left_counts, n_left)
                - (n_right as f64 / n) * entropy(&right_counts, n_right);

            if gain > best_gain {
                best_gain = gain;
                best = Some((feat_idx, threshold));
            }
        }
    }

    let (feat_idx, threshold) = best?;
    let (left_indices, right_indices) = partition(&columns[feat_idx], sample_indices, threshold);

    Some(SplitResult {
        feature: FeatureIndex::new(feat_idx),
        threshold,
        gain: best_gain,
        left_indices,
        right_indices,
    })
}
