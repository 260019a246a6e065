//! Dispatcher - fans one batch set out to every configured sink

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use contracts::{BatchSet, ContractError, DispatchConfig, Envelope, SinkConfig, SinkType};

use crate::error::{DispatcherError, SinkFailure};
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, HttpSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
    /// Upper bound on a single sink write
    pub timeout: Duration,
}

impl DispatcherConfig {
    pub fn new(sinks: Vec<SinkConfig>, dispatch: &DispatchConfig) -> Self {
        Self {
            sinks,
            timeout: dispatch.timeout(),
        }
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Build the sinks and start their workers
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = Self::initialize_handles(&self.config).await?;
        Ok(Dispatcher::with_handles(handles, self.config.timeout))
    }

    #[instrument(
        name = "dispatcher_initialize_handles",
        skip(config),
        fields(sink_count = config.sinks.len())
    )]
    async fn initialize_handles(
        config: &DispatcherConfig,
    ) -> Result<Vec<SinkHandle>, DispatcherError> {
        let mut handles = Vec::with_capacity(config.sinks.len());
        for sink_config in &config.sinks {
            match create_sink_handle(sink_config, config.timeout).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Stop the workers already started before bailing out
                    for handle in handles {
                        handle.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config, timeout),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(
    config: &SinkConfig,
    timeout: Duration,
) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity, timeout))
        }
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity, timeout))
        }
        SinkType::Http => {
            let sink = HttpSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity, timeout))
        }
    }
}

/// Outcome of a successful dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Dispatch sequence number, 0 when nothing was sent
    pub dispatch_id: u64,
    /// Batches delivered
    pub batches: usize,
    /// Messages delivered
    pub messages: usize,
    /// Sinks that accepted the batch set
    pub sinks: usize,
    /// Size of the wire body
    pub body_bytes: usize,
}

impl DispatchReport {
    fn empty() -> Self {
        Self {
            dispatch_id: 0,
            batches: 0,
            messages: 0,
            sinks: 0,
            body_bytes: 0,
        }
    }

    /// Whether the dispatch was a no-op
    pub fn is_empty(&self) -> bool {
        self.batches == 0
    }
}

/// Delivers batch sets to a fixed set of sinks
///
/// Each sink runs behind its own worker so a slow sink only delays its own
/// reply. A dispatch waits for the slowest sink, but never longer than the
/// timeout, time spent queued behind earlier writes included.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, timeout: Duration) -> Self {
        Self {
            handles,
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Number of sinks
    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Upper bound on one dispatch
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deliver one batch set to every sink
    ///
    /// An empty batch set succeeds immediately without touching any sink.
    /// The wire body is encoded once and shared. Any sink failure (error,
    /// full queue or timeout) fails the whole dispatch; nothing is retried.
    #[instrument(
        name = "dispatcher_send",
        skip(self, batch_set),
        fields(batches = batch_set.len())
    )]
    pub async fn send(&self, batch_set: BatchSet) -> Result<DispatchReport, DispatcherError> {
        if batch_set.is_empty() {
            debug!("Empty batch set, nothing to dispatch");
            return Ok(DispatchReport::empty());
        }
        if self.handles.is_empty() {
            warn!(
                messages = batch_set.message_count(),
                "No sinks configured, batch set not delivered"
            );
            return Err(DispatcherError::NoSinks {
                batches: batch_set.len(),
                messages: batch_set.message_count(),
            });
        }

        let dispatch_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = encode_body(&batch_set)
            .map_err(|source| DispatcherError::Serialization {
                dispatch_id,
                source,
            })?;

        let report = DispatchReport {
            dispatch_id,
            batches: batch_set.len(),
            messages: batch_set.message_count(),
            sinks: self.handles.len(),
            body_bytes: body.len(),
        };
        let envelope = Arc::new(Envelope {
            dispatch_id,
            batch_set,
            body,
        });

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut failures = Vec::new();
        let mut pending = Vec::with_capacity(self.handles.len());

        // Hand the envelope to every worker before waiting on any of them
        for handle in &self.handles {
            match handle.submit(Arc::clone(&envelope)) {
                Ok(p) => pending.push((handle.name(), p)),
                Err(error) => failures.push(SinkFailure {
                    sink: handle.name().to_string(),
                    error,
                }),
            }
        }

        for (name, p) in pending {
            let outcome = match tokio::time::timeout_at(deadline, p.wait()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ContractError::SinkTimeout {
                    sink_name: name.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            };
            let status = if outcome.is_ok() { "ok" } else { "error" };
            ::metrics::counter!("relay_sink_deliveries_total", "sink" => name.to_string(), "status" => status)
                .increment(1);
            if let Err(error) = outcome {
                failures.push(SinkFailure {
                    sink: name.to_string(),
                    error,
                });
            }
        }

        if !failures.is_empty() {
            warn!(
                dispatch_id,
                failed = failures.len(),
                total = self.handles.len(),
                "Dispatch failed"
            );
            return Err(DispatcherError::DeliveryFailed {
                dispatch_id,
                total: self.handles.len(),
                failures,
            });
        }

        ::metrics::counter!("relay_dispatched_batches_total").increment(report.batches as u64);
        ::metrics::counter!("relay_dispatched_messages_total").increment(report.messages as u64);
        debug!(
            dispatch_id,
            messages = report.messages,
            body_bytes = report.body_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );
        Ok(report)
    }

    /// Stop every sink worker, flushing and closing the sinks
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let count = self.handles.len();
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!(sinks = count, "Dispatcher shutdown complete");
    }
}

/// Encode a batch set into its JSON wire body
pub fn encode_body(batch_set: &BatchSet) -> Result<Bytes, ContractError> {
    serde_json::to_vec(batch_set)
        .map(Bytes::from)
        .map_err(|e| ContractError::serialization(e.to_string()))
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, dispatch))]
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    dispatch: &DispatchConfig,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig::new(sink_configs, dispatch);
    DispatcherBuilder::new(config).build().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Batch, BatchMessage, BatchSink, ErrorKind};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Sink that records every body it receives
    struct RecordingSink {
        name: String,
        received: Arc<Mutex<Vec<(u64, Bytes)>>>,
        delay: Duration,
        fail: bool,
    }

    impl RecordingSink {
        fn new(name: &str) -> (Self, Arc<Mutex<Vec<(u64, Bytes)>>>) {
            let received = Arc::new(Mutex::new(Vec::new()));
            let sink = Self {
                name: name.to_string(),
                received: Arc::clone(&received),
                delay: Duration::ZERO,
                fail: false,
            };
            (sink, received)
        }
    }

    impl BatchSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail {
                return Err(ContractError::sink_write(&self.name, "rejected"));
            }
            self.received
                .lock()
                .unwrap()
                .push((envelope.dispatch_id, envelope.body.clone()));
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn sample_set() -> BatchSet {
        BatchSet::new(vec![
            Batch {
                destination: "a".into(),
                messages: vec![BatchMessage::new("x", "t1"), BatchMessage::new("z", "t3")],
            },
            Batch {
                destination: "b".into(),
                messages: vec![BatchMessage::new("y", "t2")],
            },
        ])
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let (sink1, received1) = RecordingSink::new("sink1");
        let (sink2, received2) = RecordingSink::new("sink2");
        let handles = vec![
            SinkHandle::spawn(sink1, 10, TIMEOUT),
            SinkHandle::spawn(sink2, 10, TIMEOUT),
        ];
        let dispatcher = Dispatcher::with_handles(handles, TIMEOUT);

        let report = dispatcher.send(sample_set()).await.unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.messages, 3);
        assert_eq!(report.sinks, 2);

        let first = received1.lock().unwrap().clone();
        let second = received2.lock().unwrap().clone();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);

        let decoded: BatchSet = serde_json::from_slice(&first[0].1).unwrap();
        assert_eq!(decoded, sample_set());

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_dispatch_is_noop() {
        let (sink, received) = RecordingSink::new("sink");
        let dispatcher =
            Dispatcher::with_handles(vec![SinkHandle::spawn(sink, 10, TIMEOUT)], TIMEOUT);

        for _ in 0..3 {
            let report = dispatcher.send(BatchSet::default()).await.unwrap();
            assert!(report.is_empty());
        }

        assert!(received.lock().unwrap().is_empty());
        assert_eq!(dispatcher.metrics()[0].1.delivered_count, 0);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_ids_increase() {
        let (sink, received) = RecordingSink::new("sink");
        let dispatcher =
            Dispatcher::with_handles(vec![SinkHandle::spawn(sink, 10, TIMEOUT)], TIMEOUT);

        let first = dispatcher.send(sample_set()).await.unwrap();
        let second = dispatcher.send(sample_set()).await.unwrap();
        assert!(second.dispatch_id > first.dispatch_id);

        let ids: Vec<u64> = received.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![first.dispatch_id, second.dispatch_id]);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_sink_fails_dispatch() {
        let (good, received) = RecordingSink::new("good");
        let (mut bad, _) = RecordingSink::new("bad");
        bad.fail = true;
        let handles = vec![
            SinkHandle::spawn(good, 10, TIMEOUT),
            SinkHandle::spawn(bad, 10, TIMEOUT),
        ];
        let dispatcher = Dispatcher::with_handles(handles, TIMEOUT);

        let err = dispatcher.send(sample_set()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeliveryFailure);
        match err {
            DispatcherError::DeliveryFailed {
                total, failures, ..
            } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].sink, "bad");
            }
            other => panic!("unexpected error: {other}"),
        }

        // The healthy sink still received its copy
        assert_eq!(received.lock().unwrap().len(), 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let (mut slow, received) = RecordingSink::new("slow");
        slow.delay = Duration::from_millis(500);
        let timeout = Duration::from_millis(30);
        let dispatcher =
            Dispatcher::with_handles(vec![SinkHandle::spawn(slow, 10, timeout)], timeout);

        let started = Instant::now();
        let err = dispatcher.send(sample_set()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(err.to_string().contains("timed out"));
        assert!(received.lock().unwrap().is_empty());

        // The worker gives up on the write shortly after the dispatch does
        sleep(Duration::from_millis(100)).await;
        assert_eq!(dispatcher.metrics()[0].1.timeout_count, 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_dispatch_timeout_bounds_whole_wait() {
        // The worker alone would allow a full second per write
        let (mut slow, _) = RecordingSink::new("slow");
        slow.delay = Duration::from_millis(300);
        let handle = SinkHandle::spawn(slow, 10, Duration::from_secs(1));
        let dispatcher = Dispatcher::with_handles(vec![handle], Duration::from_millis(50));

        let started = Instant::now();
        let err = dispatcher.send(sample_set()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(err.kind(), ErrorKind::DeliveryFailure);
        match err {
            DispatcherError::DeliveryFailed { failures, .. } => {
                assert!(matches!(
                    failures[0].error,
                    ContractError::SinkTimeout { timeout_ms: 50, .. }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_sinks_fails_non_empty_dispatch() {
        let dispatcher = Dispatcher::with_handles(Vec::new(), TIMEOUT);

        assert!(dispatcher.send(BatchSet::default()).await.unwrap().is_empty());

        let err = dispatcher.send(sample_set()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeliveryFailure);
        assert!(matches!(
            err,
            DispatcherError::NoSinks {
                batches: 2,
                messages: 3
            }
        ));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_default_blueprint_delivers_flush_output() {
        let blueprint = contracts::RelayBlueprint::default();
        let dispatcher = create_dispatcher(blueprint.sinks, &blueprint.dispatch)
            .await
            .unwrap();

        let report = dispatcher.send(sample_set()).await.unwrap();
        assert_eq!(report.sinks, 1);
        assert_eq!(dispatcher.metrics()[0].1.delivered_count, 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let configs = vec![SinkConfig {
            name: "test_log".to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 50,
            params: HashMap::new(),
        }];

        let dispatcher = create_dispatcher(configs, &DispatchConfig::default())
            .await
            .unwrap();
        assert_eq!(dispatcher.sink_count(), 1);
        assert_eq!(dispatcher.timeout(), Duration::from_secs(5));

        let report = dispatcher.send(sample_set()).await.unwrap();
        assert_eq!(report.sinks, 1);
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_dispatcher_missing_params() {
        let configs = vec![SinkConfig {
            name: "no_path".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 4,
            params: HashMap::new(),
        }];

        let err = create_dispatcher(configs, &DispatchConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::SinkCreation { ref name, .. } if name == "no_path"));
    }
}
