//! Rolling-window detection of a performer standing still.

use std::collections::VecDeque;

use mimic_trees::FeatureImportance;

/// Number of recent frames the detector looks at.
pub const IDLE_WINDOW: usize = 5;

/// Number of top-importance features whose spread is measured.
pub const TRACKED_FEATURES: usize = 5;

/// Flags a stream as idle when the tracked features barely move.
#[derive(Debug, Clone)]
pub struct IdleDetector {
    window: VecDeque<Vec<f64>>,
    tracked: Vec<usize>,
    movement_threshold: f64,
}

impl IdleDetector {
    /// Create a detector that tracks every feature until
    /// [`IdleDetector::track`] narrows it down.
    #[must_use]
    pub fn new(movement_threshold: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(IDLE_WINDOW),
            tracked: Vec::new(),
            movement_threshold,
        }
    }

    /// Track the most important features; all features when nothing has
    /// positive importance.
    pub fn track(&mut self, importance: &FeatureImportance) {
        self.tracked = if importance.is_all_zero() {
            Vec::new()
        } else {
            importance
                .ranked()
                .into_iter()
                .filter(|r| r.importance > 0.0)
                .take(TRACKED_FEATURES)
                .map(|r| r.feature)
                .collect()
        };
    }

    /// Return the tracked feature indices; empty means every feature.
    #[must_use]
    pub fn tracked(&self) -> &[usize] {
        &self.tracked
    }

    /// Push a frame and return the idle confidence once the window is full.
    pub fn observe(&mut self, features: &[f64]) -> Option<f64> {
        if self.window.len() == IDLE_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(features.to_vec());
        self.idle_confidence()
    }

    /// Mean per-feature standard deviation across the window, or `None`
    /// until [`IDLE_WINDOW`] frames have been seen.
    #[must_use]
    pub fn variability(&self) -> Option<f64> {
        if self.window.len() < IDLE_WINDOW {
            return None;
        }
        let width = self.window.iter().map(Vec::len).min().unwrap_or(0);
        let features: Vec<usize> = if self.tracked.is_empty() {
            (0..width).collect()
        } else {
            self.tracked.iter().copied().filter(|&f| f < width).collect()
        };
        if features.is_empty() {
            return None;
        }

        let n = self.window.len() as f64;
        let total: f64 = features
            .iter()
            .map(|&f| {
                let mean = self.window.iter().map(|frame| frame[f]).sum::<f64>() / n;
                let var = self
                    .window
                    .iter()
                    .map(|frame| (frame[f] - mean).powi(2))
                    .sum::<f64>()
                    / n;
                var.sqrt()
            })
            .sum();
        Some(total / features.len() as f64)
    }

    /// `clamp(1 − variability / movement_threshold, 0, 1)`; zero means moving.
    #[must_use]
    pub fn idle_confidence(&self) -> Option<f64> {
        self.variability()
            .map(|v| (1.0 - v / self.movement_threshold).clamp(0.0, 1.0))
    }

    /// Return `true` when the window is full and its spread is under the threshold.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.variability()
            .is_some_and(|v| v < self.movement_threshold)
    }

    /// Forget every buffered frame.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}
