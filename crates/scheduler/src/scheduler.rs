//! BatchScheduler - periodic single-flight flush of the message queue

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use aggregator::group_by_destination;
use contracts::{ErrorKind, SchedulerConfig};
use dispatcher::{DispatchReport, Dispatcher};
use ingestion::MessageQueue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::state::FlushState;

/// Result of one flush attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush held the Flushing state
    Skipped,
    /// Queue was empty, nothing dispatched
    Empty,
    /// Batch set delivered to every sink
    Dispatched(DispatchReport),
    /// Dispatch failed; the taken messages are dropped
    Failed {
        batches: usize,
        messages: usize,
        kind: ErrorKind,
        error: String,
    },
    /// The cycle task panicked or was cancelled
    Aborted,
}

impl FlushOutcome {
    /// Metric/log label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Empty => "empty",
            Self::Dispatched(_) => "dispatched",
            Self::Failed { .. } => "failed",
            Self::Aborted => "aborted",
        }
    }

    /// Messages taken from the queue by this cycle
    pub fn messages(&self) -> usize {
        match self {
            Self::Dispatched(report) => report.messages,
            Self::Failed { messages, .. } => *messages,
            _ => 0,
        }
    }
}

/// Callback invoked after every flush attempt
pub type FlushObserver = Arc<dyn Fn(&FlushOutcome, Duration) + Send + Sync>;

/// Drains the queue on a fixed interval and hands the grouped batch set to
/// the dispatcher, never running two cycles at once.
#[derive(Clone)]
pub struct BatchScheduler {
    queue: Arc<MessageQueue>,
    dispatcher: Arc<Dispatcher>,
    config: SchedulerConfig,
    state: Arc<FlushState>,
    observer: Option<FlushObserver>,
}

impl fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("config", &self.config)
            .field("flushing", &self.state.is_flushing())
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl BatchScheduler {
    pub fn new(
        queue: Arc<MessageQueue>,
        dispatcher: Arc<Dispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            config,
            state: Arc::new(FlushState::new()),
            observer: None,
        }
    }

    /// Register a callback for every flush attempt
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&FlushOutcome, Duration) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// Whether a flush cycle is running right now
    pub fn is_flushing(&self) -> bool {
        self.state.is_flushing()
    }

    /// Run one flush cycle unless one is already in progress
    ///
    /// The cycle runs in its own task: a panic inside it is reported as
    /// `Aborted` and the Flushing state is still released.
    pub async fn flush_once(&self) -> FlushOutcome {
        let started = Instant::now();

        let Some(guard) = self.state.try_begin() else {
            debug!("Flush already in progress, skipping");
            let outcome = FlushOutcome::Skipped;
            self.report(&outcome, started.elapsed());
            return outcome;
        };

        let queue = Arc::clone(&self.queue);
        let dispatcher = Arc::clone(&self.dispatcher);
        let cycle = tokio::spawn(async move {
            let _guard = guard;
            run_cycle(&queue, &dispatcher).await
        });

        let outcome = match cycle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Flush cycle aborted");
                FlushOutcome::Aborted
            }
        };

        self.report(&outcome, started.elapsed());
        outcome
    }

    fn report(&self, outcome: &FlushOutcome, elapsed: Duration) {
        observability::record_flush_cycle(outcome.as_str(), elapsed);
        if let FlushOutcome::Dispatched(report) = outcome {
            observability::record_batch_set(report.batches, report.messages);
        }
        if let Some(observer) = &self.observer {
            observer(outcome, elapsed);
        }
    }

    /// Start the timer loop
    ///
    /// A tick that fires while a cycle is still running is delayed until it
    /// completes, so the next cycle starts one interval after the previous
    /// one ends.
    pub fn spawn(&self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();
        let period = self.config.interval().max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycles: u64 = 0;

            info!(interval_ms = period.as_millis() as u64, "Batch scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cycles += 1;
                        scheduler.flush_once().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!(cycles, "Batch scheduler stopped ticking");
            cycles
        });

        SchedulerHandle {
            shutdown_tx,
            task,
            scheduler: self.clone(),
        }
    }
}

/// take_all -> group -> dispatch
#[instrument(name = "flush_cycle", skip_all)]
async fn run_cycle(queue: &MessageQueue, dispatcher: &Dispatcher) -> FlushOutcome {
    let messages = queue.take_all();
    if messages.is_empty() {
        debug!("Queue empty, nothing to flush");
        return FlushOutcome::Empty;
    }

    let message_count = messages.len();
    let batch_set = group_by_destination(messages);
    let batch_count = batch_set.len();

    match dispatcher.send(batch_set).await {
        Ok(report) => {
            info!(
                dispatch_id = report.dispatch_id,
                batches = report.batches,
                messages = report.messages,
                sinks = report.sinks,
                "Flush cycle dispatched"
            );
            FlushOutcome::Dispatched(report)
        }
        Err(e) => {
            warn!(
                batches = batch_count,
                messages = message_count,
                error = %e,
                "Flush dispatch failed, batch set dropped"
            );
            FlushOutcome::Failed {
                batches: batch_count,
                messages: message_count,
                kind: e.kind(),
                error: e.to_string(),
            }
        }
    }
}

/// Result of stopping the timer loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Ticks handled by the timer loop
    pub cycles: u64,
    /// Outcome of the final drain, if one ran
    pub drain: Option<FlushOutcome>,
}

/// Handle to a running timer loop
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<u64>,
    scheduler: BatchScheduler,
}

impl SchedulerHandle {
    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Stop ticking, then drain once if the config asks for it
    pub async fn shutdown(self) -> ShutdownReport {
        let drain = self.scheduler.config.drain_on_shutdown;
        self.shutdown_with_drain(drain).await
    }

    /// Stop ticking, waiting for an in-flight cycle, then optionally drain
    #[instrument(name = "scheduler_shutdown", skip(self))]
    pub async fn shutdown_with_drain(self, drain: bool) -> ShutdownReport {
        let _ = self.shutdown_tx.send(true);

        let cycles = match self.task.await {
            Ok(cycles) => cycles,
            Err(e) => {
                error!(error = %e, "Scheduler task failed");
                0
            }
        };

        let drain = if drain {
            let outcome = self.scheduler.flush_once().await;
            info!(
                outcome = outcome.as_str(),
                messages = outcome.messages(),
                "Final drain complete"
            );
            Some(outcome)
        } else {
            let left = self.scheduler.queue.len();
            if left > 0 {
                warn!(pending = left, "Shutting down without drain, pending messages left");
            }
            None
        };

        ShutdownReport { cycles, drain }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{BatchSet, BatchSink, ContractError, Envelope, Message};
    use dispatcher::SinkHandle;
    use std::sync::Mutex;
    use tokio::time::sleep;

    #[derive(Default)]
    struct Behavior {
        delay: Duration,
        fail: bool,
        panic: bool,
        panic_first: bool,
    }

    struct RecordingSink {
        received: Arc<Mutex<Vec<Bytes>>>,
        behavior: Behavior,
    }

    impl BatchSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
            if self.behavior.panic {
                panic!("sink exploded");
            }
            if self.behavior.panic_first {
                self.behavior.panic_first = false;
                panic!("sink exploded once");
            }
            if !self.behavior.delay.is_zero() {
                sleep(self.behavior.delay).await;
            }
            if self.behavior.fail {
                return Err(ContractError::sink_write("recording", "rejected"));
            }
            self.received.lock().unwrap().push(envelope.body.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    struct Fixture {
        scheduler: BatchScheduler,
        queue: Arc<MessageQueue>,
        received: Arc<Mutex<Vec<Bytes>>>,
    }

    fn fixture(behavior: Behavior, config: SchedulerConfig) -> Fixture {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            received: Arc::clone(&received),
            behavior,
        };
        let timeout = Duration::from_secs(2);
        let dispatcher = Arc::new(Dispatcher::with_handles(
            vec![SinkHandle::spawn(sink, 8, timeout)],
            timeout,
        ));
        let queue = Arc::new(MessageQueue::new());
        let scheduler = BatchScheduler::new(Arc::clone(&queue), dispatcher, config);
        Fixture {
            scheduler,
            queue,
            received,
        }
    }

    fn idle_config() -> SchedulerConfig {
        SchedulerConfig {
            interval_ms: 3_600_000,
            drain_on_shutdown: true,
        }
    }

    fn decode(body: &Bytes) -> BatchSet {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_empty_cycle_does_not_dispatch() {
        let f = fixture(Behavior::default(), idle_config());

        assert_eq!(f.scheduler.flush_once().await, FlushOutcome::Empty);
        assert!(f.received.lock().unwrap().is_empty());
        assert!(!f.scheduler.is_flushing());
    }

    #[tokio::test]
    async fn test_flush_groups_by_destination() {
        let f = fixture(Behavior::default(), idle_config());
        f.queue.append(Message::new("a", "x", "t1"));
        f.queue.append(Message::new("b", "y", "t2"));
        f.queue.append(Message::new("a", "z", "t3"));

        let outcome = f.scheduler.flush_once().await;
        assert_eq!(outcome.as_str(), "dispatched");
        assert_eq!(outcome.messages(), 3);
        assert!(f.queue.is_empty());

        let received = f.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let set = decode(&received[0]);
        let a: Vec<&str> = set.get("a").unwrap().messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(a, vec!["x", "z"]);
        assert_eq!(set.get("b").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_flight_under_slow_dispatch() {
        let f = fixture(
            Behavior {
                delay: Duration::from_millis(200),
                ..Default::default()
            },
            idle_config(),
        );
        f.queue.append(Message::new("a", "x", "t1"));

        let (first, second) = tokio::join!(f.scheduler.flush_once(), f.scheduler.flush_once());

        assert_eq!(first.as_str(), "dispatched");
        assert_eq!(second, FlushOutcome::Skipped);
        assert_eq!(f.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_messages_during_flush_wait_for_next_cycle() {
        let f = fixture(
            Behavior {
                delay: Duration::from_millis(100),
                ..Default::default()
            },
            idle_config(),
        );
        f.queue.append(Message::new("a", "x", "t1"));

        let scheduler = f.scheduler.clone();
        let running = tokio::spawn(async move { scheduler.flush_once().await });
        sleep(Duration::from_millis(30)).await;
        assert!(f.scheduler.is_flushing());
        f.queue.append(Message::new("a", "late", "t2"));

        assert_eq!(running.await.unwrap().messages(), 1);
        assert_eq!(f.queue.len(), 1);

        assert_eq!(f.scheduler.flush_once().await.messages(), 1);
        assert_eq!(f.received.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_not_requeued() {
        let f = fixture(
            Behavior {
                fail: true,
                ..Default::default()
            },
            idle_config(),
        );
        f.queue.append(Message::new("a", "x", "t1"));
        f.queue.append(Message::new("b", "y", "t2"));

        match f.scheduler.flush_once().await {
            FlushOutcome::Failed {
                batches,
                messages,
                kind,
                ..
            } => {
                assert_eq!(batches, 2);
                assert_eq!(messages, 2);
                assert_eq!(kind, ErrorKind::DeliveryFailure);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(f.queue.is_empty());
        assert!(!f.scheduler.is_flushing());
    }

    #[tokio::test]
    async fn test_timer_loop_flushes_periodically() {
        let f = fixture(
            Behavior::default(),
            SchedulerConfig {
                interval_ms: 20,
                drain_on_shutdown: false,
            },
        );
        let handle = f.scheduler.spawn();

        f.queue.append(Message::new("a", "x", "t1"));
        sleep(Duration::from_millis(150)).await;

        assert_eq!(f.received.lock().unwrap().len(), 1);
        assert!(f.queue.is_empty());

        let report = handle.shutdown().await;
        assert!(report.cycles >= 2);
        assert!(report.drain.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_messages() {
        let f = fixture(Behavior::default(), idle_config());
        let handle = f.scheduler.spawn();

        f.queue.append(Message::new("a", "x", "t1"));
        let report = handle.shutdown().await;

        assert_eq!(report.cycles, 0);
        assert_eq!(report.drain.map(|o| o.messages()), Some(1));
        assert_eq!(f.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_drain_keeps_queue() {
        let f = fixture(Behavior::default(), idle_config());
        let handle = f.scheduler.spawn();

        f.queue.append(Message::new("a", "x", "t1"));
        let report = handle.shutdown_with_drain(false).await;

        assert!(report.drain.is_none());
        assert_eq!(f.queue.len(), 1);
        assert!(f.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timer_loop_survives_broken_sink() {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&outcomes);
        let f = fixture(
            Behavior {
                panic: true,
                ..Default::default()
            },
            SchedulerConfig {
                interval_ms: 20,
                drain_on_shutdown: false,
            },
        );
        let scheduler = f
            .scheduler
            .clone()
            .with_observer(move |outcome, _| seen.lock().unwrap().push(outcome.as_str()));
        let handle = scheduler.spawn();

        f.queue.append(Message::new("a", "x", "t1"));
        sleep(Duration::from_millis(80)).await;
        f.queue.append(Message::new("a", "y", "t2"));
        sleep(Duration::from_millis(80)).await;

        let report = handle.shutdown().await;
        assert!(report.cycles >= 4);

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.iter().filter(|o| **o == "failed").count(), 2);
        assert!(f.queue.is_empty());
    }

    #[tokio::test]
    async fn test_sink_recovers_after_one_panic() {
        let f = fixture(
            Behavior {
                panic_first: true,
                ..Default::default()
            },
            idle_config(),
        );

        f.queue.append(Message::new("a", "x", "t1"));
        let first = f.scheduler.flush_once().await;
        assert!(matches!(first, FlushOutcome::Failed { messages: 1, .. }), "{first:?}");

        f.queue.append(Message::new("a", "y", "t2"));
        let second = f.scheduler.flush_once().await;
        assert!(matches!(second, FlushOutcome::Dispatched(_)), "{second:?}");

        let received = f.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        let set: BatchSet = serde_json::from_slice(&received[0]).unwrap();
        assert_eq!(set.get("a").unwrap().messages[0].text, "y");
    }

    #[tokio::test]
    async fn test_observer_sees_every_attempt() {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&outcomes);
        let f = fixture(Behavior::default(), idle_config());
        let scheduler = f
            .scheduler
            .with_observer(move |outcome, _| seen.lock().unwrap().push(outcome.clone()));

        scheduler.flush_once().await;
        f.queue.append(Message::new("a", "x", "t1"));
        scheduler.flush_once().await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0], FlushOutcome::Empty);
        assert_eq!(outcomes[1].as_str(), "dispatched");
    }
}
