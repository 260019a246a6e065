//! Layered error definitions
//!
//! Categorized by source: config / submission / dispatch / sink

use std::fmt;

use thiserror::Error;

/// Coarse error classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied data that violates an invariant
    InvalidArgument,
    /// In-memory data could not be encoded for dispatch
    SerializationFailure,
    /// Sink unreachable, timed out, or rejected the request
    DeliveryFailure,
    /// Anything else
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::SerializationFailure => "serialization_failure",
            Self::DeliveryFailure => "delivery_failure",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Submission Errors =====
    /// Two pre-aggregated batches share a destination
    #[error("multiple batches contained the same destination: '{destination}'")]
    DuplicateDestination { destination: String },

    /// Submitted payload is missing a required field
    #[error("invalid submission: {message}")]
    InvalidSubmission { message: String },

    // ===== Dispatch Errors =====
    /// Batch set could not be encoded
    #[error("failed to serialize batch set: {message}")]
    Serialization { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    /// Sink did not answer within the dispatch timeout
    #[error("sink '{sink_name}' timed out after {timeout_ms}ms")]
    SinkTimeout { sink_name: String, timeout_ms: u64 },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create duplicate destination error
    pub fn duplicate_destination(destination: impl Into<String>) -> Self {
        Self::DuplicateDestination {
            destination: destination.into(),
        }
    }

    /// Create invalid submission error
    pub fn invalid_submission(message: impl Into<String>) -> Self {
        Self::InvalidSubmission {
            message: message.into(),
        }
    }

    /// Create serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateDestination { .. }
            | Self::InvalidSubmission { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigValidation { .. } => ErrorKind::InvalidArgument,
            Self::Serialization { .. } => ErrorKind::SerializationFailure,
            Self::SinkWrite { .. } | Self::SinkConnection { .. } | Self::SinkTimeout { .. } => {
                ErrorKind::DeliveryFailure
            }
            Self::Io(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }
}
