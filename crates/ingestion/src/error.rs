//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source line is not a valid message document
    #[error("line {line}: failed to parse message: {message}")]
    ParseFailed {
        /// 1-based line number
        line: u64,
        /// Error message
        message: String,
    },

    /// Source record is missing a required field
    #[error("line {line}: rejected message: {message}")]
    Rejected {
        /// 1-based line number
        line: u64,
        /// Error message
        message: String,
    },

    /// Underlying reader failed
    #[error("source read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
