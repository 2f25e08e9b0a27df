//! Feature importance aggregation across the forest and the boosting rounds.

use crate::dataset::TrainingSet;

/// Weight of boosting split mass relative to forest split mass.
pub const BOOST_GAIN_WEIGHT: f64 = 1.5;

/// F-score assigned when a feature has no within-class variance.
pub const F_SCORE_MAX: f64 = 1e3;

/// A ranked feature with its index, importance score, and rank.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RankedFeature {
    /// Zero-based feature column.
    pub feature: usize,
    /// Importance normalized by the maximum score, in [0, 1].
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Per-feature importance in [0, 1], scaled so the top feature scores 1.0.
///
/// All zeros when no tree split on anything.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureImportance {
    scores: Vec<f64>,
}

impl FeatureImportance {
    /// An all-zero importance vector for `n_features` features.
    #[must_use]
    pub fn zeros(n_features: usize) -> Self {
        Self {
            scores: vec![0.0; n_features],
        }
    }

    /// Combine split mass with class separability.
    ///
    /// `raw[f] = forest[f] + 1.5 × boost[f]`, modulated by
    /// `0.5 + 0.5 × F/(1+F)` where `F` is the feature's F-score, then divided
    /// by the maximum. Slices shorter than the widest input count as zeros.
    #[must_use]
    pub fn compute(forest_gains: &[f64], boost_gains: &[f64], f_scores: &[f64]) -> Self {
        let n = forest_gains.len().max(boost_gains.len());
        let mut scores: Vec<f64> = (0..n)
            .map(|f| {
                let raw = forest_gains.get(f).copied().unwrap_or(0.0)
                    + BOOST_GAIN_WEIGHT * boost_gains.get(f).copied().unwrap_or(0.0);
                let fs = f_scores.get(f).copied().unwrap_or(0.0);
                raw * (0.5 + 0.5 * fs / (1.0 + fs))
            })
            .collect();
        normalize_by_max(&mut scores);
        Self { scores }
    }

    /// Score for one feature; 0.0 for an out-of-range index.
    #[must_use]
    pub fn score(&self, feature: usize) -> f64 {
        self.scores.get(feature).copied().unwrap_or(0.0)
    }

    /// Return the scores indexed by feature.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.scores
    }

    /// Return the number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Return `true` if there are no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Return `true` when no feature has positive importance.
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.scores.iter().all(|&s| s <= 0.0)
    }

    /// All features sorted by descending importance (ties by index), ranked from 1.
    #[must_use]
    pub fn ranked(&self) -> Vec<RankedFeature> {
        let mut order: Vec<usize> = (0..self.scores.len()).collect();
        order.sort_by(|&a, &b| self.scores[b].total_cmp(&self.scores[a]).then(a.cmp(&b)));
        order
            .into_iter()
            .enumerate()
            .map(|(i, feature)| RankedFeature {
                feature,
                importance: self.scores[feature],
                rank: i + 1,
            })
            .collect()
    }

    /// Indices of the `k` most important features.
    #[must_use]
    pub fn top(&self, k: usize) -> Vec<usize> {
        self.ranked().into_iter().take(k).map(|r| r.feature).collect()
    }
}

/// Divide every value by the maximum; leaves the slice untouched when the
/// maximum is not positive.
pub fn normalize_by_max(values: &mut [f64]) {
    let max = values.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        values.iter_mut().for_each(|v| *v /= max);
    }
}

/// Per-feature ratio of between-class to within-class variance.
///
/// A feature with zero within-class variance gets [`F_SCORE_MAX`].
#[must_use]
pub fn f_scores(data: &TrainingSet) -> Vec<f64> {
    let n = data.n_samples() as f64;
    let n_classes = data.n_classes();
    let labels = data.labels();

    (0..data.n_features())
        .map(|f| {
            let column = data.column(f);
            let mut sums = vec![0.0f64; n_classes];
            let mut counts = vec![0usize; n_classes];
            for (&v, &label) in column.iter().zip(labels) {
                sums[label] += v;
                counts[label] += 1;
            }
            let global_mean = column.iter().sum::<f64>() / n;
            let class_means: Vec<f64> = sums
                .iter()
                .zip(&counts)
                .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
                .collect();

            let between = class_means
                .iter()
                .zip(&counts)
                .map(|(&m, &c)| c as f64 * (m - global_mean).powi(2))
                .sum::<f64>()
                / n;
            let within = column
                .iter()
                .zip(labels)
                .map(|(&v, &label)| (v - class_means[label]).powi(2))
                .sum::<f64>()
                / n;

            if within > 0.0 {
                between / within
            } else {
                F_SCORE_MAX
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_normalizes_by_max() {
        let imp = FeatureImportance::compute(&[2.0, 1.0, 0.0], &[0.0, 0.0, 0.0], &[F_SCORE_MAX; 3]);
        assert!((imp.score(0) - 1.0).abs() < 1e-12);
        assert!((imp.score(1) - 0.5).abs() < 1e-12);
        assert_eq!(imp.score(2), 0.0);
    }

    #[test]
    fn boost_gains_weighted() {
        // raw = [1.0, 1.5]; equal F-scores cancel in the normalization.
        let imp = FeatureImportance::compute(&[1.0, 0.0], &[0.0, 1.0], &[1.0, 1.0]);
        assert!((imp.score(1) - 1.0).abs() < 1e-12);
        assert!((imp.score(0) - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn f_score_modulates_between_half_and_one() {
        // Same raw mass, F = 0 vs F = ∞-ish: multipliers 0.5 and ~1.0.
        let imp = FeatureImportance::compute(&[1.0, 1.0], &[], &[0.0, F_SCORE_MAX]);
        assert!((imp.score(1) - 1.0).abs() < 1e-12);
        let expected = 0.5 / (0.5 + 0.5 * F_SCORE_MAX / (1.0 + F_SCORE_MAX));
        assert!((imp.score(0) - expected).abs() < 1e-12);
    }

    #[test]
    fn nothing_split_is_all_zero() {
        let imp = FeatureImportance::compute(&[0.0, 0.0], &[0.0, 0.0], &[1.0, 1.0]);
        assert!(imp.is_all_zero());
        assert_eq!(imp.len(), 2);
    }

    #[test]
    fn ranked_descending_with_one_based_rank() {
        let imp = FeatureImportance::compute(&[0.2, 0.8, 0.5], &[], &[1.0; 3]);
        let ranked = imp.ranked();
        assert_eq!(ranked.iter().map(|r| r.feature).collect::<Vec<_>>(), vec![1, 2, 0]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
        assert_eq!(imp.top(2), vec![1, 2]);
    }

    #[test]
    fn f_scores_separable_and_degenerate() {
        let rows = vec![
            vec![0.0, 1.0, 3.0],
            vec![0.0, 2.0, 3.0],
            vec![1.0, 1.0, 3.0],
            vec![1.0, 2.0, 3.0],
        ];
        let labels = ["a", "a", "b", "b"].iter().map(|s| s.to_string()).collect();
        let data = TrainingSet::new(rows, labels).unwrap();
        let f = f_scores(&data);
        // Feature 0: classes are constant within themselves.
        assert_eq!(f[0], F_SCORE_MAX);
        // Feature 1: identical class means, so no between-class variance.
        assert_eq!(f[1], 0.0);
        // Feature 2: constant overall.
        assert_eq!(f[2], F_SCORE_MAX);
    }
}
