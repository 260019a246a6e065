//! SinkHandle - manages a sink with isolated queue and worker task

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{BatchSink, ContractError, Envelope};

use crate::metrics::SinkMetrics;

/// One delivery request for the worker
struct DeliveryRequest {
    envelope: Arc<Envelope>,
    reply: oneshot::Sender<Result<(), ContractError>>,
}

/// A delivery accepted by the worker, awaiting its outcome
pub struct PendingDelivery {
    sink: String,
    reply: oneshot::Receiver<Result<(), ContractError>>,
}

impl PendingDelivery {
    /// Wait for the worker to report the outcome
    pub async fn wait(self) -> Result<(), ContractError> {
        match self.reply.await {
            Ok(result) => result,
            Err(_) => Err(ContractError::sink_write(
                &self.sink,
                "sink worker stopped before replying",
            )),
        }
    }
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send requests to worker
    tx: mpsc::Sender<DeliveryRequest>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    ///
    /// Every write is bounded by `timeout`; an expired write is reported as a
    /// timeout and the worker moves on to the next request.
    pub fn spawn<S: BatchSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        timeout: Duration,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name, timeout).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand an envelope to the worker (non-blocking)
    ///
    /// Fails immediately if the worker queue is full or the worker is gone.
    pub fn submit(&self, envelope: Arc<Envelope>) -> Result<PendingDelivery, ContractError> {
        let dispatch_id = envelope.dispatch_id;
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = DeliveryRequest {
            envelope,
            reply: reply_tx,
        };

        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                Ok(PendingDelivery {
                    sink: self.name.clone(),
                    reply: reply_rx,
                })
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.inc_dropped_count();
                warn!(sink = %self.name, dispatch_id, "Queue full, batch set refused");
                Err(ContractError::sink_write(&self.name, "sink queue full"))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                Err(ContractError::sink_write(&self.name, "sink worker closed"))
            }
        }
    }

    /// Submit and wait for the outcome
    pub async fn deliver(&self, envelope: Arc<Envelope>) -> Result<(), ContractError> {
        self.submit(envelope)?.wait().await
    }

    /// Shutdown the sink worker gracefully
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes requests and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics, timeout),
    fields(sink = %name)
)]
async fn sink_worker<S: BatchSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DeliveryRequest>,
    metrics: Arc<SinkMetrics>,
    name: String,
    timeout: Duration,
) {
    debug!(sink = %name, timeout_ms = timeout.as_millis() as u64, "Sink worker started");

    while let Some(request) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let envelope = request.envelope;
        let started = Instant::now();
        let write = AssertUnwindSafe(sink.write(&envelope)).catch_unwind();
        let result = match tokio::time::timeout(timeout, write).await {
            Ok(Ok(Ok(()))) => {
                metrics.record_delivered(envelope.message_count());
                debug!(
                    sink = %name,
                    dispatch_id = envelope.dispatch_id,
                    batches = envelope.batch_set.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch set delivered"
                );
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                metrics.inc_failure_count();
                error!(
                    sink = %name,
                    dispatch_id = envelope.dispatch_id,
                    error = %e,
                    "Write failed"
                );
                Err(e)
            }
            Ok(Err(panic)) => {
                metrics.inc_failure_count();
                let message = panic_message(panic.as_ref());
                error!(
                    sink = %name,
                    dispatch_id = envelope.dispatch_id,
                    panic = %message,
                    "Write panicked, worker continues"
                );
                Err(ContractError::sink_write(&name, format!("write panicked: {message}")))
            }
            Err(_) => {
                metrics.inc_failure_count();
                metrics.inc_timeout_count();
                warn!(
                    sink = %name,
                    dispatch_id = envelope.dispatch_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Write timed out"
                );
                Err(ContractError::SinkTimeout {
                    sink_name: name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        // Requester may have gone away; the outcome is already logged
        let _ = request.reply.send(result);
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
