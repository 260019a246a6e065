//! Dispatcher error types

use std::fmt;

use contracts::{ContractError, ErrorKind};
use thiserror::Error;

/// One sink's failure within a dispatch
#[derive(Debug)]
pub struct SinkFailure {
    /// Sink name
    pub sink: String,
    /// What went wrong
    pub error: ContractError,
}

impl fmt::Display for SinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sink, self.error)
    }
}

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Batch set could not be encoded; nothing was sent
    #[error("dispatch {dispatch_id}: {source}")]
    Serialization {
        dispatch_id: u64,
        #[source]
        source: ContractError,
    },

    /// A non-empty batch set met a dispatcher without sinks
    #[error("no sinks configured, {messages} message(s) in {batches} batch(es) not delivered")]
    NoSinks { batches: usize, messages: usize },

    /// One or more sinks failed to accept the batch set
    #[error("dispatch {dispatch_id}: {} of {total} sink(s) failed: {}", .failures.len(), join_failures(.failures))]
    DeliveryFailed {
        dispatch_id: u64,
        total: usize,
        failures: Vec<SinkFailure>,
    },

    /// Sink write error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] ContractError),
}

fn join_failures(failures: &[SinkFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Serialization { .. } => ErrorKind::SerializationFailure,
            Self::DeliveryFailed { .. } | Self::NoSinks { .. } => ErrorKind::DeliveryFailure,
            Self::Contract(e) => e.kind(),
            Self::SinkCreation { .. } => ErrorKind::Internal,
        }
    }
}
