//! One entropy decision tree on every feature.

use mimic_trees::{DecisionTree, DecisionTreeConfig, FeatureImportance, f_scores};
use tracing::{info, warn};

use crate::anomaly::AnomalyScorer;
use crate::classifier::GestureClassifier;
use crate::config::ClassifierConfig;
use crate::consensus::FrameStream;
use crate::error::ClassifierError;
use crate::sample::{Sample, Score, training_set};

#[derive(Debug)]
struct TreeModel {
    classes: Vec<String>,
    tree: DecisionTree,
    anomaly: AnomalyScorer,
    importance: FeatureImportance,
}

/// A single deterministic tree: cheap to train, useful as a baseline.
#[derive(Debug)]
pub struct SingleTreeClassifier {
    config: ClassifierConfig,
    model: Option<TreeModel>,
    stream: FrameStream,
}

impl SingleTreeClassifier {
    /// Create an untrained classifier.
    ///
    /// # Errors
    ///
    /// Returns the error of [`ClassifierConfig::validate`].
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        let stream = FrameStream::new(&config);
        Ok(Self {
            config,
            model: None,
            stream,
        })
    }

    fn fit(&self, samples: &[Sample]) -> Result<TreeModel, ClassifierError> {
        let data = training_set(samples)?;
        self.stream.check_classes(data.classes())?;
        let tree = DecisionTreeConfig::new()
            .with_max_depth(self.config.max_depth())
            .with_min_samples_per_leaf(self.config.min_samples_per_leaf())
            .fit(&data)?;
        let importance = FeatureImportance::compute(&tree.split_gains(), &[], &f_scores(&data));
        info!(n_nodes = tree.n_nodes(), depth = tree.depth(), "single tree trained");
        Ok(TreeModel {
            classes: data.classes().to_vec(),
            anomaly: AnomalyScorer::fit(&data),
            tree,
            importance,
        })
    }
}

impl GestureClassifier for SingleTreeClassifier {
    fn name(&self) -> &'static str {
        "single-tree"
    }

    fn train(&mut self, samples: &[Sample]) -> bool {
        self.stream.reset();
        match self.fit(samples) {
            Ok(model) => {
                self.stream.track_features(&model.importance);
                self.model = Some(model);
                true
            }
            Err(e) => {
                warn!(error = %e, "single-tree training failed");
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
        let leaf = model.tree.leaf(features);
        let class = leaf.predicted_class();
        let raw_confidence = leaf.probabilities().get(class).copied().unwrap_or(0.0);
        let label = model.classes.get(class)?.clone();
        Some(model.anomaly.calibrate(
            class,
            label,
            raw_confidence,
            features,
            leaf.sample_variance(),
        ))
    }

    fn confidence_threshold(&self) -> f64 {
        self.config.confidence_threshold()
    }

    fn feature_importance(&self) -> Option<&FeatureImportance> {
        self.model.as_ref().map(|m| &m.importance)
    }

    fn classes(&self) -> &[String] {
        match &self.model {
            Some(model) => &model.classes,
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

    #[test]
    fn separates_two_poses() {
        let mut samples = Vec::new();
        for i in 0..8 {
            let j = f64::from(i) * 0.01;
            samples.push(Sample::new(vec![0.2 + j, 0.5], "arms_down"));
            samples.push(Sample::new(vec![0.8 - j, 0.5], "arms_up"));
        }
        let mut clf =
            SingleTreeClassifier::new(ClassifierConfig::new().with_idle_detection(false)).unwrap();
        assert!(clf.train(&samples));
        assert_eq!(clf.predict(&[0.22, 0.5]).label, "arms_down");
        assert_eq!(clf.predict(&[0.78, 0.5]).label, "arms_up");
        let importance = clf.feature_importance().unwrap();
        assert!((importance.score(0) - 1.0).abs() < 1e-12);
        assert_eq!(importance.score(1), 0.0);
    }
}
