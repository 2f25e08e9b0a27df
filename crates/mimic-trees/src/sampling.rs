//! Bootstrap resampling and importance-biased feature sub-sampling.

use rand::Rng;
use rand::seq::index;

/// Draw `draw_count` sample indices from `0..n_samples` with replacement.
pub(crate) fn bootstrap_sample<R: Rng + ?Sized>(
    n_samples: usize,
    draw_count: usize,
    rng: &mut R,
) -> Vec<usize> {
    (0..draw_count).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Resolve a sampling ratio to a feature count in `[1, n_features]`.
pub(crate) fn subset_size(n_features: usize, ratio: f64) -> usize {
    ((n_features as f64 * ratio).ceil() as usize).clamp(1, n_features.max(1))
}

/// Choose `size` distinct features out of `0..n_features`.
///
/// Without importance (`None`, or all zeros) the subset is uniform. With
/// importance, `round(bias × size)` slots go to the highest-importance
/// features (ties by lower index) and the remaining slots are drawn uniformly
/// from the features not yet chosen. The result is sorted ascending so split
/// search order does not depend on draw order.
pub(crate) fn feature_subset<R: Rng + ?Sized>(
    n_features: usize,
    size: usize,
    importance: Option<&[f64]>,
    bias: f64,
    rng: &mut R,
) -> Vec<usize> {
    let size = size.min(n_features);
    let known = importance.filter(|imp| imp.iter().any(|&v| v > 0.0));

    let mut chosen: Vec<usize> = match known {
        None => index::sample(rng, n_features, size).into_vec(),
        Some(imp) => {
            let n_biased = ((bias * size as f64).round() as usize).min(size);
            let mut ranked: Vec<usize> = (0..n_features).collect();
            ranked.sort_by(|&a, &b| {
                let ia = imp.get(a).copied().unwrap_or(0.0);
                let ib = imp.get(b).copied().unwrap_or(0.0);
                ib.total_cmp(&ia).then(a.cmp(&b))
            });

            let mut chosen: Vec<usize> = ranked[..n_biased].to_vec();
            let rest: Vec<usize> = ranked[n_biased..].to_vec();
            let n_uniform = size - n_biased;
            chosen.extend(
                index::sample(rng, rest.len(), n_uniform.min(rest.len()))
                    .into_iter()
                    .map(|i| rest[i]),
            );
            chosen
        }
    };

    chosen.sort_unstable();
    chosen
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn bootstrap_draws_requested_count_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sample = bootstrap_sample(10, 25, &mut rng);
        assert_eq!(sample.len(), 25);
        assert!(sample.iter().all(|&i| i < 10));
    }

    #[test]
    fn bootstrap_is_seed_deterministic() {
        let a = bootstrap_sample(50, 50, &mut ChaCha8Rng::seed_from_u64(9));
        let b = bootstrap_sample(50, 50, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn subset_size_rounds_up_and_clamps() {
        assert_eq!(subset_size(10, 0.7), 7);
        assert_eq!(subset_size(3, 0.7), 3);
        assert_eq!(subset_size(10, 0.01), 1);
        assert_eq!(subset_size(4, 1.0), 4);
    }

    #[test]
    fn uniform_subset_is_distinct_and_sorted() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let subset = feature_subset(20, 8, None, 0.7, &mut rng);
        assert_eq!(subset.len(), 8);
        assert!(subset.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn biased_subset_contains_top_features() {
        let mut importance = vec![0.0; 10];
        importance[7] = 1.0;
        importance[2] = 0.8;
        importance[4] = 0.5;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        // size 4, bias 0.7: round(2.8) = 3 biased slots, 1 uniform.
        let subset = feature_subset(10, 4, Some(&importance), 0.7, &mut rng);
        assert_eq!(subset.len(), 4);
        for top in [2, 4, 7] {
            assert!(subset.contains(&top), "subset = {subset:?}");
        }
    }

    #[test]
    fn all_zero_importance_falls_back_to_uniform() {
        let importance = vec![0.0; 6];
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let subset = feature_subset(6, 3, Some(&importance), 0.7, &mut rng);
        assert_eq!(subset.len(), 3);
    }
}
