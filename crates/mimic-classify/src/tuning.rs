//! Confidence-threshold grid search on the training set.

use mimic_trees::{ConfusionMatrix, TrainingSet};
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::sample::Score;

/// Half-width of the search range around the configured threshold.
pub const TUNING_RADIUS: f64 = 0.1;

/// Spacing between candidate thresholds.
pub const TUNING_STEP: f64 = 0.02;

/// Outcome of a threshold search.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThresholdTuning {
    /// Threshold the search started from.
    pub configured: f64,
    /// Best threshold found.
    pub threshold: f64,
    /// Macro F1 on the training set at `threshold`.
    pub macro_f1: f64,
    /// Every candidate with its macro F1, ascending by threshold.
    pub candidates: Vec<(f64, f64)>,
}

/// Thresholds `configured ± 0.1` in steps of 0.02, clamped to [0, 1],
/// deduplicated and ascending.
#[must_use]
pub fn candidate_thresholds(configured: f64) -> Vec<f64> {
    let steps = (TUNING_RADIUS / TUNING_STEP).round() as i32;
    let mut candidates: Vec<f64> = (-steps..=steps)
        .map(|k| (configured + f64::from(k) * TUNING_STEP).clamp(0.0, 1.0))
        .collect();
    candidates.sort_unstable_by(f64::total_cmp);
    candidates.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    candidates
}

/// Score the training set once in parallel, then pick the candidate
/// threshold with the best macro F1. Abstentions count as misses. Ties go
/// to the candidate closest to `configured`.
#[instrument(skip_all, fields(configured = configured, n_samples = data.n_samples()))]
pub fn tune_threshold<F>(configured: f64, data: &TrainingSet, score: F) -> ThresholdTuning
where
    F: Fn(&[f64]) -> Option<Score> + Sync,
{
    let scores: Vec<Option<Score>> = data.rows().par_iter().map(|row| score(row)).collect();

    let candidates: Vec<(f64, f64)> = candidate_thresholds(configured)
        .into_iter()
        .map(|threshold| {
            let predicted: Vec<Option<usize>> = scores
                .iter()
                .map(|s| {
                    s.as_ref()
                        .filter(|s| s.confidence >= threshold)
                        .map(|s| s.class)
                })
                .collect();
            let f1 = ConfusionMatrix::from_predictions(data.labels(), &predicted, data.n_classes())
                .map_or(0.0, |cm| cm.macro_f1());
            (threshold, f1)
        })
        .collect();

    let best = candidates.iter().copied().max_by(|a, b| {
        a.1.total_cmp(&b.1)
            .then((b.0 - configured).abs().total_cmp(&(a.0 - configured).abs()))
    });

    let (threshold, macro_f1) = match best {
        Some(best) => best,
        None => {
            warn!("no candidate thresholds evaluated");
            (configured, 0.0)
        }
    };

    info!(threshold, macro_f1, "threshold tuning complete");

    ThresholdTuning {
        configured,
        threshold,
        macro_f1,
        candidates,
    }
}
