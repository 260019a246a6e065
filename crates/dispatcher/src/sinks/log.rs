//! LogSink - logs every destination and its messages via tracing

use contracts::{BatchSink, ContractError, Envelope};
use tracing::{info, instrument};

/// Sink that logs each batch of a batch set
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batches(&self, envelope: &Envelope) {
        for batch in &envelope.batch_set.batches {
            let texts: Vec<&str> = batch.messages.iter().map(|m| m.text.as_str()).collect();
            info!(
                sink = %self.name,
                dispatch_id = envelope.dispatch_id,
                destination = %batch.destination,
                messages = batch.len(),
                texts = ?texts,
                "Sending batch to destination"
            );
        }
    }
}

impl BatchSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, dispatch_id = envelope.dispatch_id)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.log_batches(envelope);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
