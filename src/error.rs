use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the loader, the trainer and the prediction path.
///
/// None of these are retried: every operation is a deterministic function of
/// its inputs, so a failure is reported to the caller as-is.
#[derive(Debug, Error)]
pub enum Error {
    #[error("data file not found: {}", path.display())]
    DataNotFound { path: PathBuf },

    #[error("malformed record at row {row}: cannot parse date '{value}'")]
    MalformedRecord { row: usize, value: String },

    #[error("schema mismatch on column '{column}': {reason}")]
    SchemaMismatch { column: String, reason: String },

    #[error("column '{column}' is neither numerical nor categorical; exclude it or classify it")]
    UnclassifiedColumn { column: String },

    #[error("insufficient data ({rows} usable rows): {reason}")]
    InsufficientData { rows: usize, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn missing_column(column: &str) -> Self {
        Error::SchemaMismatch {
            column: column.to_string(),
            reason: "column is absent".to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
