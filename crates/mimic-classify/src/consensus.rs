//! Sliding-window consensus voting and the per-frame motion state machine.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::idle::IdleDetector;
use crate::sample::{Classification, HISTORY_CAPACITY, PredictionHistory, PredictionRecord};

/// Confidence bonus ceiling for agreement, reached as votes grow.
pub const STABILITY_BONUS: f64 = 0.1;

/// Where the performer is in a gesture.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FrameState {
    /// Standing still (or nothing recognized yet).
    Idle,
    /// Features are changing fast; consensus requirements are raised.
    Transitioning,
    /// Holding a recognized gesture.
    Classified(String),
}

impl std::fmt::Display for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameState::Idle => write!(f, "idle"),
            FrameState::Transitioning => write!(f, "transitioning"),
            FrameState::Classified(label) => write!(f, "classified({label})"),
        }
    }
}

/// Tracks frame-to-frame feature velocity and drives [`FrameState`].
#[derive(Debug, Clone)]
pub struct MotionTracker {
    previous: Option<Vec<f64>>,
    velocity_threshold: f64,
    hold_frames: usize,
    remaining_hold: usize,
    state: FrameState,
}

impl MotionTracker {
    /// Create a tracker in the [`FrameState::Idle`] state.
    #[must_use]
    pub fn new(velocity_threshold: f64, hold_frames: usize) -> Self {
        Self {
            previous: None,
            velocity_threshold,
            hold_frames,
            remaining_hold: 0,
            state: FrameState::Idle,
        }
    }

    /// Mean absolute per-feature change since the previous frame; 0 for the first frame.
    #[must_use]
    pub fn velocity(&self, features: &[f64]) -> f64 {
        let Some(previous) = &self.previous else {
            return 0.0;
        };
        let n = previous.len().min(features.len());
        if n == 0 {
            return 0.0;
        }
        previous
            .iter()
            .zip(features)
            .map(|(a, b)| (b - a).abs())
            .sum::<f64>()
            / n as f64
    }

    /// Feed a frame. A spike (re)starts the hold; otherwise the hold counts down.
    pub fn observe(&mut self, features: &[f64]) -> f64 {
        let velocity = self.velocity(features);
        if velocity > self.velocity_threshold && self.hold_frames > 0 {
            if self.remaining_hold == 0 {
                debug!(velocity, "motion spike, entering transition");
            }
            self.remaining_hold = self.hold_frames;
            self.state = FrameState::Transitioning;
        } else {
            self.remaining_hold = self.remaining_hold.saturating_sub(1);
        }
        self.previous = Some(features.to_vec());
        velocity
    }

    /// Settle the state on the frame's final answer once the hold has expired.
    /// `idle_label` is `None` when idle detection is off.
    pub fn settle(&mut self, result: &Classification, idle_label: Option<&str>) {
        if self.remaining_hold > 0 {
            self.state = FrameState::Transitioning;
        } else if idle_label == Some(result.label.as_str()) {
            self.state = FrameState::Idle;
        } else if !result.is_unknown() {
            self.state = FrameState::Classified(result.label.clone());
        } else if self.state == FrameState::Transitioning {
            self.state = FrameState::Idle;
        }
    }

    /// Return `true` while a motion spike is being held.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.remaining_hold > 0
    }

    /// Return the current state.
    #[must_use]
    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Forget the previous frame and return to [`FrameState::Idle`].
    pub fn reset(&mut self) {
        self.previous = None;
        self.remaining_hold = 0;
        self.state = FrameState::Idle;
    }
}

/// Vote `current` together with the most recent [`HISTORY_CAPACITY`] priors.
///
/// Only non-unknown records at or above `threshold` vote. A label wins when
/// it has at least `max(1, required)` votes; among winners the most votes,
/// then the higher mean confidence, then the current frame's label is
/// preferred. The winner's confidence is its mean agreeing confidence plus
/// `0.1 × (1 − 1/votes)`, capped at 1. With no winner the result is unknown
/// carrying the current frame's confidence.
#[must_use]
pub fn vote(
    current: &Classification,
    priors: &[PredictionRecord],
    threshold: f64,
    required: usize,
) -> Classification {
    let required = required.max(1);
    let recent = &priors[priors.len().saturating_sub(HISTORY_CAPACITY)..];

    let mut tally: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    let ballots = recent
        .iter()
        .map(|r| (r.label.as_str(), r.confidence))
        .chain(std::iter::once((current.label.as_str(), current.confidence)));
    for (label, confidence) in ballots {
        if label == crate::sample::UNKNOWN_LABEL || confidence < threshold {
            continue;
        }
        let entry = tally.entry(label).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += confidence;
    }

    let winner = tally
        .into_iter()
        .filter(|&(_, (votes, _))| votes >= required)
        .map(|(label, (votes, sum))| (label, votes, sum / votes as f64))
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then(a.2.total_cmp(&b.2))
                .then((a.0 == current.label).cmp(&(b.0 == current.label)))
        });

    match winner {
        Some((label, votes, mean)) => {
            let bonus = STABILITY_BONUS * (1.0 - 1.0 / votes as f64);
            Classification::new(label, (mean + bonus).min(1.0))
        }
        None => Classification::unknown(current.confidence),
    }
}

/// Per-stream state shared by every classifier variant: prediction history,
/// idle detector and motion tracker.
#[derive(Debug, Clone)]
pub struct FrameStream {
    history: PredictionHistory,
    idle: Option<IdleDetector>,
    motion: MotionTracker,
    idle_label: String,
    stability_threshold: f64,
    transition_consensus_boost: usize,
}

impl FrameStream {
    /// Build an empty stream from the classifier configuration.
    #[must_use]
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            history: PredictionHistory::default(),
            idle: config
                .idle_detection()
                .then(|| IdleDetector::new(config.movement_threshold())),
            motion: MotionTracker::new(
                config.velocity_threshold(),
                config.transition_hold_frames(),
            ),
            idle_label: config.idle_label().to_string(),
            stability_threshold: config.stability_threshold(),
            transition_consensus_boost: config.transition_consensus_boost(),
        }
    }

    /// Point the idle detector at the model's most important features.
    pub fn track_features(&mut self, importance: &mimic_trees::FeatureImportance) {
        if let Some(idle) = &mut self.idle {
            idle.track(importance);
        }
    }

    /// Feed a frame to the motion tracker and idle detector.
    ///
    /// Returns the idle classification when the detector flags the window
    /// as idle and its confidence reaches the stability threshold, in which
    /// case the model need not be consulted.
    pub fn observe(&mut self, features: &[f64]) -> Option<Classification> {
        self.motion.observe(features);
        let idle = self.idle.as_mut()?;
        let confidence = idle.observe(features)?;
        (idle.is_idle() && confidence >= self.stability_threshold)
            .then(|| Classification::new(self.idle_label.clone(), confidence))
    }

    /// Append the frame's answer to the history and settle the motion state.
    pub fn record(&mut self, features: &[f64], result: &Classification) {
        self.history.push(PredictionRecord::new(result, features));
        let idle_label = self.idle.is_some().then_some(self.idle_label.as_str());
        self.motion.settle(result, idle_label);
    }

    /// Check a trained class list against the idle label.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::IdleLabelCollision`] when idle detection is
    /// enabled and one of `classes` equals the idle label.
    pub fn check_classes(&self, classes: &[String]) -> Result<(), ClassifierError> {
        match classes.iter().find(|c| **c == self.idle_label) {
            Some(label) if self.idle.is_some() => Err(ClassifierError::IdleLabelCollision {
                label: label.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Votes a label needs right now: `max(1, required)`, plus the
    /// transition boost while a motion spike is held.
    #[must_use]
    pub fn effective_consensus(&self, required: usize) -> usize {
        let base = required.max(1);
        if self.motion.is_transitioning() {
            base + self.transition_consensus_boost
        } else {
            base
        }
    }

    /// Return the prediction history.
    #[must_use]
    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    /// Return the motion state.
    #[must_use]
    pub fn state(&self) -> &FrameState {
        self.motion.state()
    }

    /// Return the idle detector, if enabled.
    #[must_use]
    pub fn idle_detector(&self) -> Option<&IdleDetector> {
        self.idle.as_ref()
    }

    /// Clear history, idle window and motion state.
    pub fn reset(&mut self) {
        self.history.clear();
        if let Some(idle) = &mut self.idle {
            idle.reset();
        }
        self.motion.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, confidence: f64) -> PredictionRecord {
        PredictionRecord::new(&Classification::new(label, confidence), &[0.0])
    }

    #[test]
    fn agreeing_window_wins_with_bonus() {
        let priors = vec![record("wave", 0.8), record("wave", 0.8)];
        let result = vote(&Classification::new("wave", 0.8), &priors, 0.6, 3);
        assert_eq!(result.label, "wave");
        let expected = 0.8 + STABILITY_BONUS * (1.0 - 1.0 / 3.0);
        assert!((result.confidence - expected).abs() < 1e-12);
    }

    #[test]
    fn insufficient_votes_is_unknown_with_current_confidence() {
        let priors = vec![record("wave", 0.8), record("clap", 0.9)];
        let result = vote(&Classification::new("wave", 0.7), &priors, 0.6, 3);
        assert_eq!(result, Classification::unknown(0.7));
    }

    #[test]
    fn unknown_and_low_confidence_records_do_not_vote() {
        let priors = vec![record("unknown", 0.9), record("wave", 0.5), record("wave", 0.9)];
        let result = vote(&Classification::new("wave", 0.9), &priors, 0.6, 3);
        assert!(result.is_unknown());
        let result = vote(&Classification::new("wave", 0.9), &priors, 0.6, 2);
        assert_eq!(result.label, "wave");
    }

    #[test]
    fn single_vote_gets_no_bonus() {
        let result = vote(&Classification::new("wave", 0.75), &[], 0.6, 0);
        assert_eq!(result, Classification::new("wave", 0.75));
    }

    #[test]
    fn tie_breaks_by_mean_confidence_then_current_label() {
        let priors = vec![record("clap", 0.95), record("wave", 0.7)];
        let result = vote(&Classification::new("wave", 0.7), &priors, 0.6, 1);
        // wave: 2 votes; clap: 1 vote.
        assert_eq!(result.label, "wave");

        let priors = vec![record("clap", 0.8), record("wave", 0.8), record("clap", 0.8)];
        let result = vote(&Classification::new("wave", 0.8), &priors, 0.6, 2);
        assert_eq!(result.label, "wave");
    }

    #[test]
    fn only_last_ten_priors_count() {
        let mut priors: Vec<PredictionRecord> = (0..5).map(|_| record("clap", 0.9)).collect();
        priors.extend((0..10).map(|_| record("unknown", 0.1)));
        let result = vote(&Classification::new("unknown", 0.1), &priors, 0.6, 1);
        assert!(result.is_unknown());
    }

    #[test]
    fn confidence_is_capped() {
        let priors: Vec<PredictionRecord> = (0..9).map(|_| record("wave", 1.0)).collect();
        let result = vote(&Classification::new("wave", 1.0), &priors, 0.6, 1);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spike_holds_transition_then_settles() {
        let mut tracker = MotionTracker::new(0.25, 2);
        tracker.observe(&[0.0, 0.0]);
        tracker.settle(&Classification::new("wave", 0.9), Some("idle"));
        assert_eq!(tracker.state(), &FrameState::Classified("wave".into()));

        tracker.observe(&[1.0, 1.0]);
        tracker.settle(&Classification::new("wave", 0.9), Some("idle"));
        assert_eq!(tracker.state(), &FrameState::Transitioning);
        assert!(tracker.is_transitioning());

        tracker.observe(&[1.0, 1.0]);
        tracker.settle(&Classification::new("clap", 0.9), Some("idle"));
        assert_eq!(tracker.state(), &FrameState::Transitioning);

        tracker.observe(&[1.0, 1.0]);
        tracker.settle(&Classification::new("clap", 0.9), Some("idle"));
        assert_eq!(tracker.state(), &FrameState::Classified("clap".into()));
    }

    #[test]
    fn unknown_after_transition_returns_to_idle() {
        let mut tracker = MotionTracker::new(0.25, 1);
        tracker.observe(&[0.0]);
        tracker.observe(&[1.0]);
        tracker.settle(&Classification::unknown(0.2), Some("idle"));
        assert_eq!(tracker.state(), &FrameState::Transitioning);
        tracker.observe(&[1.0]);
        tracker.settle(&Classification::unknown(0.2), Some("idle"));
        assert_eq!(tracker.state(), &FrameState::Idle);
    }

    #[test]
    fn stream_raises_consensus_while_transitioning() {
        let config = ClassifierConfig::new().with_transition_consensus_boost(2);
        let mut stream = FrameStream::new(&config);
        stream.observe(&[0.0, 0.0]);
        assert_eq!(stream.effective_consensus(3), 3);
        stream.observe(&[2.0, 2.0]);
        assert_eq!(stream.effective_consensus(3), 5);
        assert_eq!(stream.effective_consensus(0), 3);
    }

    #[test]
    fn stream_short_circuits_to_idle_label() {
        let config = ClassifierConfig::new().with_idle_label("rest");
        let mut stream = FrameStream::new(&config);
        let mut last = None;
        for _ in 0..crate::idle::IDLE_WINDOW {
            last = stream.observe(&[0.4, 0.4]);
        }
        assert_eq!(last, Some(Classification::new("rest", 1.0)));
    }

    #[test]
    fn moving_stream_never_short_circuits_at_zero_stability() {
        let config = ClassifierConfig::new().with_stability_threshold(0.0);
        let mut stream = FrameStream::new(&config);
        let poses = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 0.0]];
        for i in 0..12 {
            assert_eq!(stream.observe(&poses[i % poses.len()]), None, "frame {i}");
        }
        assert!(!stream.idle_detector().unwrap().is_idle());
    }

    #[test]
    fn idle_label_collision_depends_on_detection() {
        let classes = vec!["idle".to_string(), "wave".to_string()];
        let stream = FrameStream::new(&ClassifierConfig::new());
        assert!(matches!(
            stream.check_classes(&classes),
            Err(ClassifierError::IdleLabelCollision { label }) if label == "idle"
        ));

        let stream = FrameStream::new(&ClassifierConfig::new().with_idle_detection(false));
        assert!(stream.check_classes(&classes).is_ok());
        let stream = FrameStream::new(&ClassifierConfig::new().with_idle_label("rest"));
        assert!(stream.check_classes(&classes).is_ok());
    }

    #[test]
    fn class_named_like_idle_label_classifies_without_detection() {
        let config = ClassifierConfig::new().with_idle_detection(false);
        let mut stream = FrameStream::new(&config);
        stream.observe(&[0.0]);
        stream.record(&[0.0], &Classification::new("idle", 0.9));
        assert_eq!(stream.state(), &FrameState::Classified("idle".into()));
    }

    #[test]
    fn disabled_idle_detection_never_short_circuits() {
        let config = ClassifierConfig::new().with_idle_detection(false);
        let mut stream = FrameStream::new(&config);
        for _ in 0..10 {
            assert_eq!(stream.observe(&[0.4, 0.4]), None);
        }
        assert!(stream.idle_detector().is_none());
    }
}
