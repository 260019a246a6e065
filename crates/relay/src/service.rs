//! RelayService - the two inbound operations

use std::sync::Arc;

use aggregator::validate_no_duplicate_destinations;
use contracts::{BatchSet, ContractError, Message};
use dispatcher::{DispatchReport, Dispatcher};
use ingestion::{IngestionMetrics, MessageIntake, MessageQueue};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::error::{RelayError, Result};

/// Inbound side of the relay
///
/// Single messages go into the queue and wait for the next flush cycle.
/// Pre-aggregated batch sets skip the queue and go straight to the delivery
/// dispatcher once validated.
pub struct RelayService {
    queue: Arc<MessageQueue>,
    delivery: Arc<Dispatcher>,
}

impl RelayService {
    pub fn new(queue: Arc<MessageQueue>, delivery: Arc<Dispatcher>) -> Self {
        Self { queue, delivery }
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Accept one message for batching
    ///
    /// Returns as soon as the message is queued; delivery happens later and
    /// its failures are never reported back here.
    pub fn submit_message(&self, message: Message) -> Result<()> {
        self.queue.submit(message)?;
        Ok(())
    }

    /// Decode a JSON message body and accept it
    pub fn submit_message_json(&self, body: &str) -> Result<()> {
        let message: Message = serde_json::from_str(body).map_err(|e| {
            self.queue.metrics().record_rejected();
            ContractError::invalid_submission(e.to_string())
        })?;
        self.submit_message(message)
    }

    /// Forward a pre-aggregated batch set
    ///
    /// Nothing is sent unless every batch names a non-empty destination and
    /// no destination appears twice.
    #[instrument(
        name = "relay_submit_batches",
        skip(self, batch_set),
        fields(batches = batch_set.len())
    )]
    pub async fn submit_batches(&self, batch_set: BatchSet) -> Result<DispatchReport> {
        batch_set
            .validate()
            .map_err(|e| ContractError::invalid_submission(e.to_string()))?;

        if let Err(e) = validate_no_duplicate_destinations(&batch_set) {
            warn!(error = %e, "Batch set rejected");
            return Err(e.into());
        }

        for batch in &batch_set.batches {
            debug!(
                destination = %batch.destination,
                messages = batch.len(),
                "Forwarding batch"
            );
        }

        let report = self.delivery.send(batch_set).await?;
        info!(
            dispatch_id = report.dispatch_id,
            batches = report.batches,
            messages = report.messages,
            "Aggregated batches forwarded"
        );
        Ok(report)
    }

    /// Decode a JSON batch set body and forward it
    pub async fn submit_batches_json(&self, body: &str) -> Result<DispatchReport> {
        let batch_set: BatchSet = serde_json::from_str(body)
            .map_err(|e| ContractError::invalid_submission(e.to_string()))?;
        self.submit_batches(batch_set).await
    }
}

impl MessageIntake for RelayService {
    type Error = RelayError;

    fn accept(&self, message: Message) -> Result<()> {
        self.submit_message(message)
    }

    fn metrics(&self) -> Arc<IngestionMetrics> {
        self.queue.metrics()
    }
}
