//! Error types shared across the pipeline
//!
//! Every variant carries the key that caused it: a column name, a fold id
//! or an artifact path.

use std::path::PathBuf;
use thiserror::Error;

use crate::ml::metrics::MetricError;
use crate::models::ModelError;

/// Problems with the content of a dataset
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    #[error("Cannot cast value {value:?} in column {column} (row {row}) to {target}")]
    Cast {
        column: String,
        row: usize,
        value: String,
        target: &'static str,
    },

    #[error("Target column {column} must hold exactly two classes, found {found:?}")]
    DegenerateTarget { column: String, found: Vec<String> },

    #[error("Target column {column} has a missing value at row {row}")]
    MissingTarget { column: String, row: usize },

    #[error("Dataset has {rows} rows, fewer than the {n_splits} folds requested")]
    TooFewRows { rows: usize, n_splits: usize },

    #[error("Length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Row {row} was already covered before fold {fold}")]
    DuplicateRow { row: usize, fold: usize },

    #[error("Out-of-fold table is incomplete: folds {missing_folds:?} missing, {covered} of {rows} rows covered")]
    IncompleteFolds {
        missing_folds: Vec<usize>,
        covered: usize,
        rows: usize,
    },

    #[error("Identifier {id:?} in column {column} has no prediction")]
    UnknownId { column: String, id: String },
}

/// Top-level error for training, inference and submission runs
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Expected {expected} model artifacts, missing: {missing:?}")]
    ArtifactMissing {
        expected: usize,
        missing: Vec<PathBuf>,
    },

    #[error("Artifact I/O failed for {path:?}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact {path:?} is corrupt: {reason}")]
    ArtifactCorrupt { path: PathBuf, reason: String },

    #[error("Fold {fold} failed to fit: {source}")]
    Fit {
        fold: usize,
        #[source]
        source: ModelError,
    },

    #[error("Prediction failed: {0}")]
    Predict(#[source] ModelError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write report {path:?}: {reason}")]
    Report { path: PathBuf, reason: String },
}

/// Result alias used by the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;
