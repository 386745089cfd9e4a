//! Error types for the feeder.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, FeederError>;

#[derive(Error, Debug)]
pub enum FeederError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent from the feature store or metadata.
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    /// A column exists but holds a type the loader cannot read.
    #[error("Column '{column}' has unsupported type {found}")]
    UnsupportedColumn { column: String, found: String },

    /// A text cell was null or not valid UTF-8.
    #[error("Column '{column}', row {row}: {reason}")]
    BadValue {
        column: String,
        row: usize,
        reason: String,
    },

    /// A scene label that the vocabulary does not know.
    #[error("Unknown label '{0}'")]
    UnknownLabel(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The index set a stream would iterate is empty.
    #[error("The {0} index set is empty")]
    EmptyIndexSet(&'static str),
}
