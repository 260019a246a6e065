//! # Observability
//!
//! Tracing and Prometheus metrics for the relay.
//!
//! - `init_tracing`: one subscriber for the whole process, `RUST_LOG` wins over the level given
//! - `install_prometheus`: scrape endpoint for the `metrics` facade
//! - Flush cycle metric helpers and an in-memory summary aggregator
//!
//! ## Usage Example
//!
//! ```ignore
//! use observability::{FlushStatsAggregator, LogFormat};
//!
//! observability::init_tracing(LogFormat::Compact, "info")?;
//! observability::install_prometheus(9000)?;
//!
//! let mut stats = FlushStatsAggregator::new();
//! stats.update(outcome.as_str(), outcome.messages(), elapsed);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_batch_set, record_flush_cycle, record_queue_depth, record_submission,
    FlushStatsAggregator, FlushSummary, RunningStats, StatsSummary,
};

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON, one object per event
    Json,
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// Single line
    Compact,
}

/// Build the env filter: `RUST_LOG` when set, `default_level` otherwise
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global tracing subscriber
pub fn init_tracing(format: LogFormat, default_level: &str) -> Result<()> {
    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(log_format = ?format, default_level, "Tracing initialized");
    Ok(())
}

/// Install the Prometheus recorder and its HTTP listener on `0.0.0.0:port`
pub fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
