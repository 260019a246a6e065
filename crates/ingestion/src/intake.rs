//! Entry point sources hand decoded messages to

use std::fmt;
use std::sync::Arc;

use contracts::{ContractError, Message};

use crate::metrics::IngestionMetrics;
use crate::queue::MessageQueue;

/// Accepts messages produced by a source
pub trait MessageIntake: Send + Sync {
    type Error: fmt::Display;

    /// Validate and enqueue one message
    fn accept(&self, message: Message) -> Result<(), Self::Error>;

    /// Counters of the queue behind this intake
    fn metrics(&self) -> Arc<IngestionMetrics>;
}

impl MessageIntake for MessageQueue {
    type Error = ContractError;

    fn accept(&self, message: Message) -> Result<(), ContractError> {
        self.submit(message)
    }

    fn metrics(&self) -> Arc<IngestionMetrics> {
        MessageQueue::metrics(self)
    }
}
