//! BatchSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, Envelope};

/// Batch set output trait
///
/// All sink implementations must implement this trait. One `write` call
/// carries one whole batch set.
#[trait_variant::make(BatchSink: Send)]
pub trait LocalBatchSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one encoded batch set
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
