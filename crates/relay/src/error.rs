//! Relay error types

use contracts::{ContractError, ErrorKind};
use dispatcher::DispatcherError;
use thiserror::Error;

/// Errors returned by the inbound operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// Submission rejected before anything was queued or forwarded
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Batch set was valid but delivery failed
    #[error(transparent)]
    Dispatch(#[from] DispatcherError),
}

impl RelayError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Contract(e) => e.kind(),
            Self::Dispatch(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
