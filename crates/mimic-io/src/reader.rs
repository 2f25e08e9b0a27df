//! CSV readers for labeled samples and unlabeled frame streams.

use std::path::{Path, PathBuf};

use mimic_classify::Sample;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{FrameSequence, SampleSet};

/// Reads labeled training samples from a CSV file.
///
/// Expected CSV format:
/// - Header row required: `label,f0,f1,...,fN`
/// - One row per sample; the first column is the gesture label, the rest
///   are feature values
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoFeatureColumns`] | Header has only the label column |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::EmptyLabel`] | Label cell is empty |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
pub struct SampleReader {
    path: PathBuf,
}

impl SampleReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`SampleSet`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<SampleSet, IoError> {
        let table = read_table(&self.path, true)?;
        let samples: Vec<Sample> = table
            .rows
            .into_iter()
            .map(|row| Sample::new(row.values, row.label))
            .collect();

        info!(
            n_samples = samples.len(),
            n_features = table.feature_names.len(),
            "sample set loaded"
        );
        Ok(SampleSet::new(table.feature_names, samples))
    }
}

/// Reads an unlabeled frame stream from a CSV file.
///
/// Expected CSV format: header `f0,f1,...,fN`, one frame per row in
/// capture order. Errors are those of [`SampleReader`] minus the label checks.
pub struct FrameReader {
    path: PathBuf,
}

impl FrameReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`FrameSequence`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<FrameSequence, IoError> {
        let table = read_table(&self.path, false)?;
        let frames: Vec<Vec<f64>> = table.rows.into_iter().map(|row| row.values).collect();

        info!(
            n_frames = frames.len(),
            n_features = table.feature_names.len(),
            "frame stream loaded"
        );
        Ok(FrameSequence {
            feature_names: table.feature_names,
            frames,
        })
    }
}

struct Row {
    label: String,
    values: Vec<f64>,
}

struct Table {
    feature_names: Vec<String>,
    rows: Vec<Row>,
}

fn read_table(path: &Path, labeled: bool) -> Result<Table, IoError> {
    let file = std::fs::File::open(path).map_err(|e| IoError::FileNotFound {
        path: path.to_path_buf(),
        source: e,
    })?;

    // flexible(true) so a short row surfaces as InconsistentRowLength
    // rather than a low-level CsvParse error.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let csv_error = |e: csv::Error| IoError::CsvParse {
        path: path.to_path_buf(),
        offset: e.position().map_or(0, |p| p.byte()),
        source: e,
    };

    let header = rdr.headers().map_err(csv_error)?;
    let expected_cols = header.len();
    let first_feature = usize::from(labeled);
    debug!(expected_cols, labeled, "read CSV header");

    if expected_cols <= first_feature {
        return Err(IoError::NoFeatureColumns {
            path: path.to_path_buf(),
        });
    }
    let feature_names: Vec<String> = header
        .iter()
        .skip(first_feature)
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_error)?;

        if record.len() != expected_cols {
            return Err(IoError::InconsistentRowLength {
                path: path.to_path_buf(),
                row_index,
                expected: expected_cols,
                got: record.len(),
            });
        }

        let label = if labeled {
            let label = record.get(0).unwrap_or("");
            if label.is_empty() {
                return Err(IoError::EmptyLabel {
                    path: path.to_path_buf(),
                    row_index,
                });
            }
            label.to_string()
        } else {
            String::new()
        };

        let mut values = Vec::with_capacity(feature_names.len());
        for (col_index, raw) in record.iter().skip(first_feature).enumerate() {
            let value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| IoError::NonFiniteValue {
                    path: path.to_path_buf(),
                    row_index,
                    col_index,
                    raw: raw.to_string(),
                })?;
            values.push(value);
        }

        rows.push(Row { label, values });
    }

    if rows.is_empty() {
        return Err(IoError::EmptyDataset {
            path: path.to_path_buf(),
        });
    }

    Ok(Table {
        feature_names,
        rows,
    })
}
