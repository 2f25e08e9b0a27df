//! File I/O and report serialization for the mimic gesture pipeline.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{ExperimentName, FrameSequence, SampleSet};
pub use error::IoError;
pub use reader::{FrameReader, SampleReader};
pub use writer::{EvaluationSummary, ReplayFrame, ReportWriter};
