//! Forest + boosted-tree classifier with anomaly-discounted confidence.

use std::collections::BTreeMap;
use std::sync::Arc;

use mimic_trees::{
    FeatureImportance, GradientBoostedTrees, GradientBoostingConfig, RandomForest,
    RandomForestConfig, TrainingSet, f_scores,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument, warn};

use crate::anomaly::AnomalyScorer;
use crate::classifier::GestureClassifier;
use crate::config::ClassifierConfig;
use crate::consensus::FrameStream;
use crate::error::ClassifierError;
use crate::sample::{Sample, Score, training_set};
use crate::tuning::{ThresholdTuning, tune_threshold};

/// Number of top features listed by [`EnsembleClassifier::diagnostic_info`].
const DIAGNOSTIC_TOP_FEATURES: usize = 5;

/// An immutable trained model: forest, boosting rounds, importance and centroids.
///
/// Built completely before it replaces the previous model, and shared as an
/// `Arc` for read-only scoring from other threads.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnsembleModel {
    classes: Vec<String>,
    n_features: usize,
    forest: RandomForest,
    boosted: GradientBoostedTrees,
    importance: FeatureImportance,
    anomaly: AnomalyScorer,
}

impl EnsembleModel {
    /// Train every component on `data`, drawing forest randomness from `rng`.
    ///
    /// # Errors
    ///
    /// Returns the [`mimic_trees::TreeError`] of the forest or boosting step.
    #[instrument(skip_all, fields(n_samples = data.n_samples(), n_features = data.n_features()))]
    pub fn fit<R: Rng + ?Sized>(
        config: &ClassifierConfig,
        data: &TrainingSet,
        rng: &mut R,
    ) -> Result<Self, ClassifierError> {
        let forest = RandomForestConfig::new(config.num_rf_trees())?
            .with_max_depth(config.max_depth())
            .with_min_samples_per_leaf(config.min_samples_per_leaf())
            .with_feature_sampling_ratio(config.feature_sampling_ratio())
            .fit(data, rng)?;

        let boosted = GradientBoostingConfig::new(config.num_gb_trees())
            .with_forest_depth(config.max_depth())
            .with_min_samples_per_leaf(config.min_samples_per_leaf())
            .with_learning_rate(config.learning_rate())
            .fit(data)?;

        let importance =
            FeatureImportance::compute(&forest.split_gains(), &boosted.split_gains(), &f_scores(data));
        let anomaly = AnomalyScorer::fit(data);

        Ok(Self {
            classes: data.classes().to_vec(),
            n_features: data.n_features(),
            forest,
            boosted,
            importance,
            anomaly,
        })
    }

    /// Score one frame. `None` for non-finite input or an empty forest.
    #[must_use]
    pub fn score(&self, features: &[f64]) -> Option<Score> {
        if features.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let forest_proba = self.forest.predict_proba(features)?;
        let combined = self.boosted.combine(forest_proba.as_slice(), features);
        let class = combined.predicted_class();
        let label = self.classes.get(class)?.clone();
        Some(self.anomaly.calibrate(
            class,
            label,
            combined.confidence(),
            features,
            self.leaf_variance(features),
        ))
    }

    /// Mean spread of the forest leaves reached by `features`; widens the
    /// class spread when scoring anomaly.
    #[must_use]
    pub fn leaf_variance(&self, features: &[f64]) -> f64 {
        let trees = self.forest.trees();
        if trees.is_empty() {
            return 0.0;
        }
        trees
            .iter()
            .map(|t| t.leaf(features).sample_variance())
            .sum::<f64>()
            / trees.len() as f64
    }

    /// Return the sorted class labels.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Return the feature count the model was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the bagged forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Return the boosting rounds.
    #[must_use]
    pub fn boosted(&self) -> &GradientBoostedTrees {
        &self.boosted
    }

    /// Return the normalized feature importance.
    #[must_use]
    pub fn importance(&self) -> &FeatureImportance {
        &self.importance
    }

    /// Return the centroid scorer.
    #[must_use]
    pub fn anomaly_scorer(&self) -> &AnomalyScorer {
        &self.anomaly
    }
}

/// The default classifier: random forest blended with boosted residual trees.
#[derive(Debug)]
pub struct EnsembleClassifier {
    config: ClassifierConfig,
    model: Option<Arc<EnsembleModel>>,
    training: Option<Arc<TrainingSet>>,
    threshold: f64,
    stream: FrameStream,
}

impl EnsembleClassifier {
    /// Create an untrained classifier.
    ///
    /// # Errors
    ///
    /// Returns the error of [`ClassifierConfig::validate`].
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        config.validate()?;
        let stream = FrameStream::new(&config);
        Ok(Self {
            threshold: config.confidence_threshold(),
            config,
            model: None,
            training: None,
            stream,
        })
    }

    /// Train with an RNG seeded from the config (or the OS when unseeded).
    ///
    /// # Errors
    ///
    /// Returns the validation or training error; the classifier is left untrained.
    pub fn try_train(&mut self, samples: &[Sample]) -> Result<(), ClassifierError> {
        let mut rng = match self.config.seed() {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.train_with_rng(samples, &mut rng)
    }

    /// Train drawing all randomness from `rng`.
    ///
    /// On success the new model replaces the old one in a single swap and the
    /// stream is reset. On failure the old model is dropped.
    ///
    /// # Errors
    ///
    /// | Variant                       | When                                   |
    /// |-------------------------------|----------------------------------------|
    /// | [`ClassifierError::Tree`]     | samples are empty, ragged, non-finite, or unlabeled |
    #[instrument(skip_all, fields(n_samples = samples.len()))]
    pub fn train_with_rng<R: Rng + ?Sized>(
        &mut self,
        samples: &[Sample],
        rng: &mut R,
    ) -> Result<(), ClassifierError> {
        let built = training_set(samples)
            .map_err(ClassifierError::from)
            .and_then(|data| {
                self.stream.check_classes(data.classes())?;
                let model = EnsembleModel::fit(&self.config, &data, rng)?;
                Ok((data, model))
            });

        let (data, model) = match built {
            Ok(built) => built,
            Err(e) => {
                self.model = None;
                self.training = None;
                self.threshold = self.config.confidence_threshold();
                self.stream.reset();
                return Err(e);
            }
        };

        info!(
            n_classes = model.classes().len(),
            rf_trees = model.forest().n_trees(),
            gb_trees = model.boosted().n_trees(),
            "ensemble trained"
        );

        self.stream.reset();
        self.stream.track_features(model.importance());
        self.model = Some(Arc::new(model));
        self.training = Some(Arc::new(data));
        self.threshold = self.config.confidence_threshold();

        if self.config.auto_tune_threshold() {
            self.tune_threshold();
        }
        Ok(())
    }

    /// Grid-search the threshold on the training set and apply the best one.
    ///
    /// Returns `None` when untrained. Only the scalar threshold changes.
    pub fn tune_threshold(&mut self) -> Option<ThresholdTuning> {
        let model = Arc::clone(self.model.as_ref()?);
        let data = Arc::clone(self.training.as_ref()?);
        let tuning = tune_threshold(self.config.confidence_threshold(), &data, |row| {
            model.score(row)
        });
        self.threshold = tuning.threshold;
        Some(tuning)
    }

    /// Share the trained model for read-only scoring elsewhere.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<EnsembleModel>> {
        self.model.clone()
    }

    /// Return the configuration.
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Describe the model for logs and reports.
    #[must_use]
    pub fn diagnostic_info(&self) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        info.insert("classifier".into(), self.name().to_string());
        info.insert("trained".into(), self.is_trained().to_string());
        info.insert("confidence_threshold".into(), format!("{:.3}", self.threshold));
        info.insert(
            "configured_threshold".into(),
            format!("{:.3}", self.config.confidence_threshold()),
        );
        info.insert("stream_state".into(), self.stream.state().to_string());
        info.insert("history_len".into(), self.stream.history().len().to_string());

        if let Some(model) = &self.model {
            info.insert("classes".into(), model.classes().join(","));
            info.insert("n_features".into(), model.n_features().to_string());
            info.insert("rf_trees".into(), model.forest().n_trees().to_string());
            info.insert("rf_nodes".into(), model.forest().n_nodes().to_string());
            info.insert("gb_trees".into(), model.boosted().n_trees().to_string());
            info.insert("gb_nodes".into(), model.boosted().n_nodes().to_string());
            let top = model
                .importance()
                .ranked()
                .into_iter()
                .take(DIAGNOSTIC_TOP_FEATURES)
                .map(|r| format!("{}:{:.3}", r.feature, r.importance))
                .collect::<Vec<_>>()
                .join(",");
            info.insert("top_features".into(), top);
        }
        info
    }
}

impl GestureClassifier for EnsembleClassifier {
    fn name(&self) -> &'static str {
        "ensemble"
    }

    fn train(&mut self, samples: &[Sample]) -> bool {
        match self.try_train(samples) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "ensemble training failed");
                false
            }
        }
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn score(&self, features: &[f64]) -> Option<Score> {
        self.model.as_ref()?.score(features)
    }

    fn confidence_threshold(&self) -> f64 {
        self.threshold
    }

    fn feature_importance(&self) -> Option<&FeatureImportance> {
        self.model.as_deref().map(EnsembleModel::importance)
    }

    fn classes(&self) -> &[String] {
        match &self.model {
            Some(model) => model.classes(),
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
