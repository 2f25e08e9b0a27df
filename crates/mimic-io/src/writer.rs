//! JSON report writer for evaluation and replay runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mimic_classify::{CrossValidationResult, ThresholdTuning};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Everything an `evaluate` run reports.
#[derive(Debug)]
pub struct EvaluationSummary<'a> {
    /// Variant name, e.g. `"ensemble"`.
    pub classifier: &'a str,
    /// Feature column names, in feature-index order.
    pub feature_names: &'a [String],
    /// Importance of the model trained on the full sample set.
    pub importance: &'a [f64],
    /// Threshold search on the full sample set, when it ran.
    pub tuning: Option<&'a ThresholdTuning>,
    /// Cross-validation outcome.
    pub cross_validation: &'a CrossValidationResult,
    /// Free-form model description.
    pub diagnostics: &'a BTreeMap<String, String>,
}

/// One frame of a replay run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFrame {
    /// Zero-based frame index.
    pub frame: usize,
    /// Per-frame answer before voting.
    pub label: String,
    /// Per-frame confidence.
    pub confidence: f64,
    /// Answer after consensus voting.
    pub consensus_label: String,
    /// Confidence after consensus voting.
    pub consensus_confidence: f64,
    /// Motion state after the frame.
    pub state: String,
}

/// Writes run reports to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_evaluate.json` and
/// `{experiment}_replay.json`.
pub struct ReportWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ReportWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write an evaluation report to `{experiment}_evaluate.json` and return its path.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | The report cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all)]
    pub fn write_evaluation(&self, summary: &EvaluationSummary<'_>) -> Result<PathBuf, IoError> {
        let path = self.report_path("evaluate");
        let cv = summary.cross_validation;

        let mut features: Vec<FeatureEntry<'_>> = summary
            .feature_names
            .iter()
            .zip(summary.importance)
            .map(|(name, &importance)| FeatureEntry {
                name: name.as_str(),
                importance,
                rank: 0,
            })
            .collect();
        features.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        for (i, entry) in features.iter_mut().enumerate() {
            entry.rank = i + 1;
        }

        let class_metrics: Vec<ClassEntry<'_>> = cv
            .class_metrics
            .iter()
            .map(|m| ClassEntry {
                label: cv.class_names.get(m.class).map_or("", String::as_str),
                precision: m.precision,
                recall: m.recall,
                f1: m.f1,
                support: m.support,
            })
            .collect();

        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            classifier: summary.classifier,
            n_samples: cv.n_samples,
            n_features: cv.n_features,
            n_folds: cv.n_folds,
            cv_accuracy_mean: cv.mean_accuracy,
            cv_accuracy_std: cv.std_accuracy,
            fold_accuracies: &cv.fold_accuracies,
            macro_f1: cv.macro_f1,
            unknown_rate: cv.unknown_rate,
            classes: &cv.class_names,
            confusion_matrix: cv.confusion_matrix.as_rows(),
            class_metrics,
            feature_importances: features,
            threshold: summary.tuning.map(|t| ThresholdEntry {
                configured: t.configured,
                tuned: t.threshold,
                macro_f1: t.macro_f1,
            }),
            diagnostics: summary.diagnostics,
        };

        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "evaluation report written");
        Ok(path)
    }

    /// Write a replay report to `{experiment}_replay.json` and return its path.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | The report cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all, fields(n_frames = frames.len()))]
    pub fn write_replay(
        &self,
        classifier: &str,
        required_consensus: usize,
        frames: &[ReplayFrame],
    ) -> Result<PathBuf, IoError> {
        let path = self.report_path("replay");

        let mut label_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for frame in frames {
            *label_counts.entry(frame.consensus_label.as_str()).or_insert(0) += 1;
        }

        let artifact = ReplayArtifact {
            experiment: self.experiment.as_str(),
            classifier,
            required_consensus,
            n_frames: frames.len(),
            label_counts,
            frames,
        };

        self.write_json(&path, &artifact)?;
        info!(path = %path.display(), "replay report written");
        Ok(path)
    }

    fn report_path(&self, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.json", self.experiment.as_str()))
    }

    fn write_json(&self, path: &Path, artifact: &impl Serialize) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    classifier: &'a str,
    n_samples: usize,
    n_features: usize,
    n_folds: usize,
    cv_accuracy_mean: f64,
    cv_accuracy_std: f64,
    fold_accuracies: &'a [f64],
    macro_f1: f64,
    unknown_rate: f64,
    classes: &'a [String],
    confusion_matrix: &'a [Vec<usize>],
    class_metrics: Vec<ClassEntry<'a>>,
    feature_importances: Vec<FeatureEntry<'a>>,
    threshold: Option<ThresholdEntry>,
    diagnostics: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct FeatureEntry<'a> {
    name: &'a str,
    importance: f64,
    rank: usize,
}

#[derive(Serialize)]
struct ClassEntry<'a> {
    label: &'a str,
    precision: f64,
    recall: f64,
    f1: f64,
    support: usize,
}

#[derive(Serialize)]
struct ThresholdEntry {
    configured: f64,
    tuned: f64,
    macro_f1: f64,
}

#[derive(Serialize)]
struct ReplayArtifact<'a> {
    experiment: &'a str,
    classifier: &'a str,
    required_consensus: usize,
    n_frames: usize,
    label_counts: BTreeMap<&'a str, usize>,
    frames: &'a [ReplayFrame],
}
