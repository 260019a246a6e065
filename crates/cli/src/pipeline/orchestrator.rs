//! Pipeline orchestrator - wires source, relay service, scheduler and dispatchers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use ingestion::{JsonLinesSource, MessageQueue, MockMessageSource, MockSourceConfig, SourceStats};
use observability::FlushStatsAggregator;
use relay::RelayService;
use scheduler::BatchScheduler;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Where messages come from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// JSON lines from stdin
    Stdin,
    /// JSON lines from a file
    File(PathBuf),
    /// Generated messages
    Mock(MockSourceConfig),
    /// No producer; flush whatever arrives until stopped
    Idle,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The relay blueprint
    pub blueprint: RelayBlueprint,

    /// Message producer
    pub input: InputSource,

    /// Stop after this long (None = until input ends or a shutdown signal)
    pub duration: Option<Duration>,

    /// Run a final flush on shutdown
    pub drain: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

type ReaderOutcome = Result<ingestion::Result<SourceStats>, JoinError>;

/// A running producer
enum RunningSource {
    Reader {
        handle: JoinHandle<ingestion::Result<SourceStats>>,
        outcome: Option<ReaderOutcome>,
    },
    Mock {
        source: MockMessageSource,
        handle: JoinHandle<u64>,
        outcome: Option<Result<u64, JoinError>>,
    },
    Idle,
}

impl RunningSource {
    fn reader(handle: JoinHandle<ingestion::Result<SourceStats>>) -> Self {
        Self::Reader {
            handle,
            outcome: None,
        }
    }

    /// Resolves when the producer has nothing more to send
    ///
    /// Cancel safe: the task result is kept for `stop`.
    async fn finished(&mut self) {
        match self {
            Self::Reader { handle, outcome } => *outcome = Some(handle.await),
            Self::Mock { handle, outcome, .. } => *outcome = Some(handle.await),
            Self::Idle => std::future::pending::<()>().await,
        }
    }

    /// Stop producing and record how many messages were produced
    async fn stop(self, stats: &mut PipelineStats) {
        match self {
            Self::Reader { handle, outcome } => {
                let outcome = match outcome {
                    Some(outcome) => outcome,
                    None => {
                        handle.abort();
                        handle.await
                    }
                };
                match outcome {
                    Ok(Ok(source)) => {
                        stats.lines_read = source.lines;
                        stats.lines_skipped = source.skipped;
                    }
                    Ok(Err(e)) => warn!(error = %e, "Input source failed"),
                    Err(e) if e.is_cancelled() => info!("Input source stopped"),
                    Err(e) => warn!(error = %e, "Input source task failed"),
                }
            }
            Self::Mock {
                source,
                handle,
                outcome,
            } => {
                let outcome = match outcome {
                    Some(outcome) => outcome,
                    None => {
                        source.stop();
                        handle.await
                    }
                };
                match outcome {
                    Ok(sent) => stats.lines_read = sent,
                    Err(e) => warn!(error = %e, "Mock source task failed"),
                }
            }
            Self::Idle => {}
        }
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the input ends, the duration elapses or a shutdown signal arrives
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::install_prometheus(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Setup Dispatcher
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - every non-empty flush cycle will fail");
        }

        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), &blueprint.dispatch)
            .await
            .map_err(|e| CliError::startup("dispatcher", e.to_string()))?;
        let dispatcher = Arc::new(dispatcher);

        info!(
            sinks = dispatcher.sink_count(),
            timeout_ms = blueprint.dispatch.timeout_ms,
            "Dispatcher started"
        );

        let delivery = dispatcher::create_dispatcher(
            blueprint.delivery_sinks.clone(),
            &blueprint.dispatch,
        )
        .await
        .map_err(|e| CliError::startup("delivery dispatcher", e.to_string()))?;
        let delivery = Arc::new(delivery);

        // Setup Scheduler
        let queue = Arc::new(MessageQueue::new());
        let relay = Arc::new(RelayService::new(Arc::clone(&queue), Arc::clone(&delivery)));
        let flush_stats = Arc::new(Mutex::new(FlushStatsAggregator::new()));
        let observer_stats = Arc::clone(&flush_stats);

        let scheduler = BatchScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&dispatcher),
            blueprint.scheduler.clone(),
        )
        .with_observer(move |outcome, elapsed| {
            observer_stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .update(outcome.as_str(), outcome.messages(), elapsed);
        });
        let scheduler_handle = scheduler.spawn();

        info!(
            interval_ms = blueprint.scheduler.interval_ms,
            drain = self.config.drain,
            "Scheduler started"
        );

        // Start Producer
        let mut source = self
            .start_source(Arc::clone(&relay))
            .await
            .context("Failed to start input source")?;

        let duration = self.config.duration;
        let deadline = async move {
            match duration {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = source.finished() => info!("Input exhausted"),
            _ = deadline => info!("Run duration elapsed"),
            _ = shutdown_signal() => warn!("Received shutdown signal, stopping relay..."),
        }

        // Shutdown
        info!("Shutting down relay...");
        let mut stats = PipelineStats {
            active_sinks: dispatcher.sink_count(),
            ..Default::default()
        };
        source.stop(&mut stats).await;

        let report = scheduler_handle.shutdown_with_drain(self.config.drain).await;
        stats.cycles = report.cycles;
        stats.drain = report.drain.map(|o| o.as_str());
        stats.messages_pending = queue.len();

        let ingest = queue.metrics().snapshot();
        stats.messages_ingested = ingest.messages_appended;
        stats.parse_errors = ingest.parse_errors;
        stats.rejected = ingest.rejected;
        stats.sink_metrics = dispatcher.metrics();

        // The scheduler handle and the producer are gone, so these are the last references
        drop(scheduler);
        drop(relay);
        for (role, dispatcher) in [("flush", dispatcher), ("delivery", delivery)] {
            match Arc::try_unwrap(dispatcher) {
                Ok(dispatcher) => dispatcher.shutdown().await,
                Err(_) => warn!(role, "Dispatcher still referenced, sinks not closed"),
            }
        }

        stats.flush = flush_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            messages = stats.messages_ingested,
            "Relay shutdown complete"
        );

        Ok(stats)
    }

    async fn start_source(&self, relay: Arc<RelayService>) -> Result<RunningSource> {
        match &self.config.input {
            InputSource::Stdin => {
                info!("Reading JSON-lines messages from stdin");
                let reader = BufReader::new(tokio::io::stdin());
                Ok(RunningSource::reader(spawn_reader("stdin", reader, relay)))
            }
            InputSource::File(path) => {
                info!(path = %path.display(), "Reading JSON-lines messages from file");
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| CliError::input(path.display().to_string(), e))?;
                let name = path.display().to_string();
                Ok(RunningSource::reader(spawn_reader(
                    name,
                    BufReader::new(file),
                    relay,
                )))
            }
            InputSource::Mock(config) => {
                info!(
                    destinations = ?config.destinations,
                    rate_hz = config.rate_hz,
                    limit = ?config.limit,
                    "Running in MOCK mode"
                );
                let source = MockMessageSource::new(config.clone());
                let handle = source.start(relay);
                Ok(RunningSource::Mock {
                    source,
                    handle,
                    outcome: None,
                })
            }
            InputSource::Idle => {
                info!("No input configured, waiting for shutdown");
                Ok(RunningSource::Idle)
            }
        }
    }
}

fn spawn_reader<R>(
    name: impl Into<String>,
    reader: R,
    relay: Arc<RelayService>,
) -> JoinHandle<ingestion::Result<SourceStats>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let source = JsonLinesSource::new(name, reader);
    tokio::spawn(source.run(relay))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
