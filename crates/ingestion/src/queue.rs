//! Pending message queue
//!
//! Many concurrent appenders, one periodic drainer. The lock is held only for a
//! single push or a single swap, never across I/O.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, Message};
use tracing::trace;
use validator::Validate;

use crate::metrics::IngestionMetrics;

/// Unbounded, append-only-until-drained message buffer
///
/// Only `append` and `take_all` move messages. A message appended concurrently
/// with `take_all` lands either in that snapshot or in the next one, never both.
#[derive(Debug, Default)]
pub struct MessageQueue {
    pending: Mutex<Vec<Message>>,
    metrics: Arc<IngestionMetrics>,
}

impl MessageQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue reporting into shared metrics
    pub fn with_metrics(metrics: Arc<IngestionMetrics>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            metrics,
        }
    }

    /// Add one message. Never fails and enforces no upper bound.
    pub fn append(&self, message: Message) {
        let len = {
            let mut pending = self.lock();
            pending.push(message);
            pending.len()
        };

        self.metrics.record_appended();
        self.metrics.update_queue_len(len);
        ::metrics::counter!("relay_messages_appended_total").increment(1);
        trace!(queue_len = len, "message appended");
    }

    /// Validate one message and append it
    ///
    /// A message without a destination is counted as rejected and never queued.
    pub fn submit(&self, message: Message) -> Result<(), ContractError> {
        if let Err(e) = message.validate() {
            self.metrics.record_rejected();
            return Err(ContractError::invalid_submission(e.to_string()));
        }
        self.append(message);
        Ok(())
    }

    /// Atomically remove and return every held message, leaving the queue empty
    pub fn take_all(&self) -> Vec<Message> {
        let taken = std::mem::take(&mut *self.lock());

        self.metrics.record_taken(taken.len());
        self.metrics.update_queue_len(0);
        taken
    }

    /// Current number of pending messages
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no messages are pending
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Shared metrics handle
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    // A panic while holding the lock cannot leave the Vec half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
