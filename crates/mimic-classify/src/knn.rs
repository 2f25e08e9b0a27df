//! k-nearest-neighbour classifier over stored training frames.

use mimic_trees::{FeatureImportance, TrainingSet, argmax};
use tracing::{info, warn};

use crate::anomaly::AnomalyScorer;
use crate::classifier::GestureClassifier;
use crate::config::ClassifierConfig;
use crate::consensus::FrameStream;
use crate::error::ClassifierError;
use crate::sample::{Sample, Score, training_set};

#[derive(Debug)]
struct NeighborModel {
    data: TrainingSet,
    anomaly: AnomalyScorer,
    importance: FeatureImportance,
}

/// Majority vote among the `k` closest training samples (Euclidean).
///
/// Raw confidence is the winning vote share. Features are not rescaled.
#[derive(Debug)]
pub struct NearestNeighborClassifier {
    config: ClassifierConfig,
    k: usize,
    model: Option<NeighborModel>,
    stream: FrameStream,
}

impl NearestNeighborClassifier {
    /// Create an untrained classifier.
    ///
    /// # Errors
    ///
    /// | Variant                                   | When                   |
    /// |-------------------------------------------|------------------------|
    /// | [`ClassifierError::InvalidNeighborCount`] | `k` is zero            |
    /// | any [`ClassifierConfig::validate`] error  | invalid configuration  |
    pub fn new(config: ClassifierConfig, k: usize) -> Result<Self, ClassifierError> {
        if k == 0 {
            return Err(ClassifierError::InvalidNeighborCount { k });
        }
        config.validate()?;
        let stream = FrameStream::new(&config);
        Ok(Self {
            config,
            k,
            model: None,
            stream,
        })
    }

    /// Return the neighbour count.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Indices of the `k` nearest training samples, closest first (ties by index).
    fn neighbors(data: &TrainingSet, features: &[f64], k: usize) -> Vec<usize> {
        let mut by_distance: Vec<(f64, usize)> = data
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let d2: f64 = row.iter().zip(features).map(|(a, b)| (a - b).powi(2)).sum();
                (d2, i)
            })
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        by_distance.into_iter().take(k).map(|(_, i)| i).collect()
    }
}

impl GestureClassifier for NearestNeighborClassifier {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn train(&mut self, samples: &[Sample]) -> bool {
        self.stream.reset();
        let checked = training_set(samples)
            .map_err(ClassifierError::from)
            .and_then(|data| {
                self.stream.check_classes(data.classes())?;
                Ok(data)
            });
        match checked {
            Ok(data) => {
                let anomaly = AnomalyScorer::fit(&data);
                info!(n_samples = data.n_samples(), k = self.k, "nearest-neighbour model stored");
                self.model = Some(NeighborModel {
                    importance: FeatureImportance::zeros(data.n_features()),
                    data,
                    anomaly,
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "nearest-neighbour training failed");
                self.model = None;
                false
            }
        }
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn score(&self, features: &[f64]) -> Option<Score> {
        let model = self.model.as_ref()?;
        if features.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let neighbors = Self::neighbors(&model.data, features, self.k);
        let mut votes = vec![0.0f64; model.data.n_classes()];
        for &i in &neighbors {
            votes[model.data.labels()[i]] += 1.0;
        }
        let class = argmax(&votes);
        let raw_confidence = votes[class] / neighbors.len().max(1) as f64;
        let label = model.data.classes().get(class)?.clone();
        Some(model.anomaly.calibrate(class, label, raw_confidence, features, 0.0))
    }

    fn confidence_threshold(&self) -> f64 {
        self.config.confidence_threshold()
    }

    fn feature_importance(&self) -> Option<&FeatureImportance> {
        self.model.as_ref().map(|m| &m.importance)
    }

    fn classes(&self) -> &[String] {
        match &self.model {
            Some(model) => model.data.classes(),
            None => &[],
        }
    }

    fn stream(&self) -> &FrameStream {
        &self.stream
    }

    fn stream_mut(&mut self) -> &mut FrameStream {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Classification;

    fn samples() -> Vec<Sample> {
        let mut out = Vec::new();
        for i in 0..6 {
            let j = f64::from(i) * 0.02;
            out.push(Sample::new(vec![0.0 + j, 0.0], "left"));
            out.push(Sample::new(vec![1.0 - j, 1.0], "right"));
        }
        out
    }

    fn config() -> ClassifierConfig {
        ClassifierConfig::new().with_idle_detection(false)
    }

    #[test]
    fn zero_k_rejected() {
        assert!(matches!(
            NearestNeighborClassifier::new(config(), 0),
            Err(ClassifierError::InvalidNeighborCount { k: 0 })
        ));
    }

    #[test]
    fn majority_of_neighbors_wins() {
        let mut clf = NearestNeighborClassifier::new(config(), 3).unwrap();
        assert!(clf.train(&samples()));
        let result = clf.predict(&[0.05, 0.0]);
        assert_eq!(result, Classification::new("left", 1.0));
    }

    #[test]
    fn far_query_is_unknown() {
        let mut clf = NearestNeighborClassifier::new(config(), 3).unwrap();
        assert!(clf.train(&samples()));
        assert!(clf.predict(&[6.0, -6.0]).is_unknown());
    }

    #[test]
    fn untrained_and_empty() {
        let mut clf = NearestNeighborClassifier::new(config(), 3).unwrap();
        assert_eq!(clf.predict(&[0.0, 0.0]), Classification::unknown(0.0));
        assert!(!clf.train(&[]));
        assert!(!clf.is_trained());
    }
}
