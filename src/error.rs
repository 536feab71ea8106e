use thiserror::Error;

use crate::types::FileId;

/// Convenience result type for pipeline operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Result type returned by the format parsers.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type returned by [`crate::storage::RecordSink`] and [`crate::storage::RecordStore`].
pub type SinkResult<T> = Result<T, SinkError>;

/// A format-specific decode or structure failure.
///
/// Parsers never return partial output: any of these fails the whole file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// CSV decode error, including rows whose field count differs from the header.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "excel")]
    /// Workbook decode error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// JSON syntax error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structurally unusable input (no header row, empty workbook, ...).
    #[error("malformed input: {message}")]
    Malformed { message: String },
}

/// Failure reported by a record sink or record store backend.
#[derive(Debug, Error)]
pub enum SinkError {
    #[cfg(feature = "sqlite")]
    /// SQLite error (feature-gated behind `sqlite`).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Row payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink was driven out of order (e.g. `write_row` without an open transaction).
    #[error("transaction error: {message}")]
    Transaction { message: String },

    /// Any other backend failure.
    #[error("{message}")]
    Backend { message: String },
}

impl SinkError {
    pub(crate) fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }
}

/// Error type returned by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The request was rejected before any bytes were stored (bad name, extension or size).
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The file could not be decoded by its format parser.
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// The record sink/store failed; any open transaction has been rolled back.
    #[error("persistence failed: {0}")]
    Persistence(#[from] SinkError),

    /// The byte store failed to save or delete the raw upload.
    #[error("file storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// No file record exists for the given id.
    #[error("file not found: {file_id}")]
    NotFound { file_id: FileId },

    /// Configuration could not be loaded or is out of range.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl IngestionError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
