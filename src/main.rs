use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use mimic_classify::{
    ClassifierConfig, ClassifierKind, CrossValidation, EnsembleClassifier, GestureClassifier,
    ThresholdTuning, build_classifier,
};
use mimic_io::{
    EvaluationSummary, ExperimentName, FrameReader, ReplayFrame, ReportWriter, SampleReader,
};

#[derive(Parser)]
#[command(name = "mimic")]
#[command(about = "Trainable gesture and pose classification from pose feature vectors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel scoring (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Variant {
    /// Random forest blended with boosted residual trees
    Ensemble,
    /// k nearest training samples
    Knn,
    /// One entropy decision tree
    SingleTree,
}

/// Classifier selection and model parameters.
#[derive(Args, Debug, Clone)]
struct ClassifierArgs {
    /// Classifier variant
    #[arg(long, value_enum, default_value_t = Variant::Ensemble)]
    classifier: Variant,

    /// Neighbour count for the knn variant
    #[arg(long, default_value_t = 5)]
    k: usize,

    /// Minimum calibrated confidence for a non-unknown answer
    #[arg(long, default_value_t = 0.6)]
    confidence_threshold: f64,

    /// Number of random forest trees
    #[arg(long, default_value_t = 20)]
    rf_trees: usize,

    /// Number of boosting rounds (0 disables boosting)
    #[arg(long, default_value_t = 10)]
    gb_trees: usize,

    /// Maximum forest tree depth
    #[arg(long, default_value_t = 8)]
    max_depth: usize,

    /// Sample count at or below which a node becomes a leaf
    #[arg(long, default_value_t = 2)]
    min_samples_per_leaf: usize,

    /// Fraction of features offered to each forest tree
    #[arg(long, default_value_t = 0.7)]
    feature_sampling_ratio: f64,

    /// Boosting shrinkage
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Disable the idle short-circuit
    #[arg(long, default_value_t = false)]
    no_idle: bool,

    /// Grid-search the confidence threshold after training
    #[arg(long, default_value_t = false)]
    auto_tune: bool,
}

impl ClassifierArgs {
    fn kind(&self) -> ClassifierKind {
        match self.classifier {
            Variant::Ensemble => ClassifierKind::Ensemble,
            Variant::Knn => ClassifierKind::NearestNeighbors { k: self.k },
            Variant::SingleTree => ClassifierKind::SingleTree,
        }
    }

    fn config(&self, seed: u64) -> ClassifierConfig {
        ClassifierConfig::new()
            .with_confidence_threshold(self.confidence_threshold)
            .with_num_rf_trees(self.rf_trees)
            .with_num_gb_trees(self.gb_trees)
            .with_max_depth(self.max_depth)
            .with_min_samples_per_leaf(self.min_samples_per_leaf)
            .with_feature_sampling_ratio(self.feature_sampling_ratio)
            .with_learning_rate(self.learning_rate)
            .with_idle_detection(!self.no_idle)
            .with_auto_tune_threshold(self.auto_tune)
            .with_seed(Some(seed))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Train on labeled samples, tune, cross-validate and write a report
    Evaluate {
        /// Path to the labeled sample CSV (label,f0,...,fN)
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Number of cross-validation folds
        #[arg(long, default_value_t = 5)]
        cv_folds: usize,

        #[command(flatten)]
        classifier: ClassifierArgs,
    },

    /// Train on labeled samples, then stream recorded frames through the consensus window
    Replay {
        /// Path to the labeled sample CSV (label,f0,...,fN)
        #[arg(long)]
        data: PathBuf,

        /// Path to the frame CSV (f0,...,fN), one frame per row
        #[arg(long)]
        frames: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Agreeing recent frames needed before a label is reported
        #[arg(long, default_value_t = 3)]
        consensus: usize,

        #[command(flatten)]
        classifier: ClassifierArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct EvaluateOutput {
    experiment: String,
    classifier: &'static str,
    n_samples: usize,
    n_classes: usize,
    cv_mean_accuracy: f64,
    cv_std_accuracy: f64,
    macro_f1: f64,
    confidence_threshold: f64,
    report: PathBuf,
}

#[derive(Serialize)]
struct ReplayOutput {
    experiment: String,
    classifier: &'static str,
    n_frames: usize,
    n_unknown: usize,
    final_state: String,
    report: PathBuf,
}

/// A trained classifier plus what the report needs from the concrete type.
struct Trained {
    classifier: Box<dyn GestureClassifier>,
    tuning: Option<ThresholdTuning>,
    diagnostics: BTreeMap<String, String>,
}

/// Train the selected variant on `samples`. The ensemble threshold is tuned
/// when `tune` or `--auto-tune` asks for it.
fn train(
    args: &ClassifierArgs,
    seed: u64,
    samples: &[mimic_classify::Sample],
    tune: bool,
) -> Result<Trained> {
    let config = args.config(seed);
    if let ClassifierKind::Ensemble = args.kind() {
        let mut clf = EnsembleClassifier::new(config.with_auto_tune_threshold(false))
            .context("invalid classifier configuration")?;
        clf.try_train(samples).context("training failed")?;
        let tuning = if tune || args.auto_tune {
            clf.tune_threshold()
        } else {
            None
        };
        let diagnostics = clf.diagnostic_info();
        return Ok(Trained {
            classifier: Box::new(clf),
            tuning,
            diagnostics,
        });
    }

    let mut clf =
        build_classifier(args.kind(), config).context("invalid classifier configuration")?;
    if !clf.train(samples) {
        anyhow::bail!("{} training rejected the sample set", clf.name());
    }
    let mut diagnostics = BTreeMap::new();
    diagnostics.insert("classifier".to_string(), clf.name().to_string());
    diagnostics.insert("classes".to_string(), clf.classes().join(","));
    diagnostics.insert(
        "confidence_threshold".to_string(),
        format!("{:.3}", clf.confidence_threshold()),
    );
    Ok(Trained {
        classifier: clf,
        tuning: None,
        diagnostics,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Evaluate {
            data,
            experiment,
            output_dir,
            cv_folds,
            classifier,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            let set = SampleReader::new(&data)
                .read()
                .context("failed to read sample CSV")?;

            // 1. Train on everything for importance, tuning and diagnostics
            let trained = train(&classifier, cli.seed, set.samples(), true)?;
            let clf = &trained.classifier;
            let importance = clf
                .feature_importance()
                .map(|fi| fi.as_slice().to_vec())
                .unwrap_or_default();
            if let Some(tuning) = &trained.tuning {
                info!(
                    configured = tuning.configured,
                    tuned = tuning.threshold,
                    macro_f1 = tuning.macro_f1,
                    "threshold tuned"
                );
            }

            // 2. Cross-validate with a fresh classifier per fold
            let kind = classifier.kind();
            let cv_result = CrossValidation::new(cv_folds)?
                .with_seed(cli.seed)
                .evaluate(set.samples(), |fold| {
                    build_classifier(kind, classifier.config(cli.seed.wrapping_add(fold as u64)))
                })
                .context("cross-validation failed")?;

            // 3. Write the report
            let writer = ReportWriter::new(&output_dir, experiment_name)?;
            let report = writer.write_evaluation(&EvaluationSummary {
                classifier: clf.name(),
                feature_names: set.feature_names(),
                importance: &importance,
                tuning: trained.tuning.as_ref(),
                cross_validation: &cv_result,
                diagnostics: &trained.diagnostics,
            })?;

            let output = EvaluateOutput {
                experiment,
                classifier: clf.name(),
                n_samples: set.n_samples(),
                n_classes: clf.classes().len(),
                cv_mean_accuracy: cv_result.mean_accuracy,
                cv_std_accuracy: cv_result.std_accuracy,
                macro_f1: cv_result.macro_f1,
                confidence_threshold: clf.confidence_threshold(),
                report,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Replay {
            data,
            frames,
            experiment,
            output_dir,
            consensus,
            classifier,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            let set = SampleReader::new(&data)
                .read()
                .context("failed to read sample CSV")?;
            let stream = FrameReader::new(&frames)
                .read()
                .context("failed to read frame CSV")?;
            if stream.feature_names.len() != set.n_features() {
                warn!(
                    frame_features = stream.feature_names.len(),
                    sample_features = set.n_features(),
                    "frame width differs from training width"
                );
            }

            let Trained {
                classifier: mut clf,
                ..
            } = train(&classifier, cli.seed, set.samples(), false)?;

            let mut replay = Vec::with_capacity(stream.frames.len());
            for (frame, features) in stream.frames.iter().enumerate() {
                let voted = clf.predict_with_history(features, consensus);
                let (label, confidence) = clf
                    .stream()
                    .history()
                    .latest()
                    .map_or((voted.label.clone(), voted.confidence), |r| {
                        (r.label.clone(), r.confidence)
                    });
                replay.push(ReplayFrame {
                    frame,
                    label,
                    confidence,
                    consensus_label: voted.label,
                    consensus_confidence: voted.confidence,
                    state: clf.stream().state().to_string(),
                });
            }

            let writer = ReportWriter::new(&output_dir, experiment_name)?;
            let report = writer.write_replay(clf.name(), consensus, &replay)?;

            let output = ReplayOutput {
                experiment,
                classifier: clf.name(),
                n_frames: replay.len(),
                n_unknown: replay
                    .iter()
                    .filter(|f| f.consensus_label == mimic_classify::UNKNOWN_LABEL)
                    .count(),
                final_state: clf.stream().state().to_string(),
                report,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
