//! Stratified k-fold cross-validation over any [`GestureClassifier`].

use std::collections::BTreeMap;

use mimic_trees::{ClassMetrics, ConfusionMatrix};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::classifier::GestureClassifier;
use crate::error::ClassifierError;
use crate::sample::Sample;

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of stratified k-fold cross-validation.
#[derive(Debug)]
pub struct CrossValidationResult {
    /// Accuracy for each fold. Abstentions count as errors.
    pub fold_accuracies: Vec<f64>,
    /// Pooled confusion matrix with an unknown column.
    pub confusion_matrix: ConfusionMatrix,
    /// Per-class metrics of the pooled matrix.
    pub class_metrics: Vec<ClassMetrics>,
    /// Class labels in confusion-matrix order.
    pub class_names: Vec<String>,
    /// Mean accuracy across folds.
    pub mean_accuracy: f64,
    /// Standard deviation of fold accuracies.
    pub std_accuracy: f64,
    /// Macro F1 of the pooled matrix.
    pub macro_f1: f64,
    /// Fraction of held-out frames answered "unknown".
    pub unknown_rate: f64,
    /// Number of folds.
    pub n_folds: usize,
    /// Total number of samples.
    pub n_samples: usize,
    /// Number of features.
    pub n_features: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, ClassifierError> {
        if n_folds < 2 {
            return Err(ClassifierError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Run stratified k-fold cross-validation.
    ///
    /// `make_classifier(fold)` builds a fresh classifier for each fold. Each
    /// held-out sample is predicted on a reset stream, so consensus and idle
    /// state never leak between samples.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ClassifierError::Tree`] | Zero samples |
    /// | [`ClassifierError::TooFewSamplesForFolds`] | A class has fewer samples than folds |
    /// | [`ClassifierError::TrainingFailed`] | A classifier rejected its training fold |
    /// | Other classifier errors | From `make_classifier` |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = samples.len()))]
    pub fn evaluate<F>(
        &self,
        samples: &[Sample],
        mut make_classifier: F,
    ) -> Result<CrossValidationResult, ClassifierError>
    where
        F: FnMut(usize) -> Result<Box<dyn GestureClassifier>, ClassifierError>,
    {
        if samples.is_empty() {
            return Err(mimic_trees::TreeError::EmptyDataset.into());
        }

        let class_names: Vec<String> = samples
            .iter()
            .map(|s| s.label().to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        let class_of: BTreeMap<&str, usize> = class_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let labels: Vec<usize> = samples
            .iter()
            .map(|s| class_of.get(s.label()).copied().unwrap_or_default())
            .collect();

        let fold_assignments = self.stratified_split(&labels, &class_names)?;

        let mut fold_accuracies = Vec::with_capacity(self.n_folds);
        let mut all_true = Vec::with_capacity(samples.len());
        let mut all_predicted = Vec::with_capacity(samples.len());

        for fold in 0..self.n_folds {
            let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
                (0..samples.len()).partition(|&i| fold_assignments[i] == fold);
            let train: Vec<Sample> = train_idx.iter().map(|&i| samples[i].clone()).collect();

            let mut classifier = make_classifier(fold)?;
            if !classifier.train(&train) {
                return Err(ClassifierError::TrainingFailed {
                    classifier: classifier.name(),
                    fold,
                });
            }

            let mut correct = 0usize;
            for &i in &test_idx {
                classifier.reset_stream();
                let result = classifier.predict(samples[i].features());
                let predicted = class_of.get(result.label.as_str()).copied();
                if predicted == Some(labels[i]) {
                    correct += 1;
                }
                all_true.push(labels[i]);
                all_predicted.push(predicted);
            }

            let fold_accuracy = correct as f64 / test_idx.len().max(1) as f64;
            fold_accuracies.push(fold_accuracy);
            info!(fold, accuracy = fold_accuracy, "fold completed");
        }

        let mean_accuracy = fold_accuracies.iter().sum::<f64>() / self.n_folds as f64;
        let std_accuracy = {
            let variance = fold_accuracies
                .iter()
                .map(|&a| (a - mean_accuracy).powi(2))
                .sum::<f64>()
                / self.n_folds as f64;
            variance.sqrt()
        };

        let confusion_matrix =
            ConfusionMatrix::from_predictions(&all_true, &all_predicted, class_names.len())?;

        info!(mean_accuracy, std_accuracy, "cross-validation complete");

        Ok(CrossValidationResult {
            fold_accuracies,
            class_metrics: confusion_matrix.class_metrics(),
            macro_f1: confusion_matrix.macro_f1(),
            unknown_rate: confusion_matrix.unknown_rate(),
            confusion_matrix,
            class_names,
            mean_accuracy,
            std_accuracy,
            n_folds: self.n_folds,
            n_samples: samples.len(),
            n_features: samples[0].features().len(),
        })
    }

    /// Shuffle within each class, then deal samples round-robin across folds.
    fn stratified_split(
        &self,
        labels: &[usize],
        class_names: &[String],
    ) -> Result<Vec<usize>, ClassifierError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; class_names.len()];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        for (class, indices) in class_indices.iter().enumerate() {
            if indices.len() < self.n_folds {
                return Err(ClassifierError::TooFewSamplesForFolds {
                    label: class_names[class].clone(),
                    count: indices.len(),
                    n_folds: self.n_folds,
                });
            }
        }

        let mut fold_assignments = vec![0usize; labels.len()];
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                fold_assignments[idx] = j % self.n_folds;
            }
        }

        Ok(fold_assignments)
    }
}
