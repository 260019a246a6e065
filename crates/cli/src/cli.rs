//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Batch Relay - groups messages by destination and forwards them on a timer
#[derive(Parser, Debug)]
#[command(
    name = "batch-relay",
    author,
    version,
    about = "Destination-batching message relay",
    long_about = "Accepts messages addressed to destinations, holds them in memory and \n\
                  periodically forwards everything received since the last flush as one \n\
                  batch set, grouped by destination, to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "BATCH_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "BATCH_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay: ingest messages and flush them periodically
    Run(RunArgs),

    /// Forward a pre-aggregated batch set through the delivery sinks
    Deliver(DeliverArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "BATCH_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read JSON-lines messages from this file ("-" for stdin)
    #[arg(short, long, conflicts_with = "mock")]
    pub input: Option<PathBuf>,

    /// Generate messages with the mock source instead of reading input
    #[arg(long)]
    pub mock: bool,

    /// Destinations cycled through by the mock source
    #[arg(long, value_delimiter = ',', default_value = "compliance,audit")]
    pub mock_destinations: Vec<String>,

    /// Mock messages per second
    #[arg(long, default_value = "10")]
    pub mock_rate: f64,

    /// Stop the mock source after this many messages (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub mock_limit: u64,

    /// Override the flush interval (milliseconds)
    #[arg(long, env = "BATCH_RELAY_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Override the sink write timeout (milliseconds)
    #[arg(long, env = "BATCH_RELAY_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Skip the final flush on shutdown
    #[arg(long)]
    pub no_drain: bool,

    /// Stop after this many seconds (0 = until input ends or Ctrl+C)
    #[arg(long, default_value = "0", env = "BATCH_RELAY_DURATION")]
    pub duration: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "BATCH_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `deliver` command
#[derive(Parser, Debug)]
pub struct DeliverArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "BATCH_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON file holding `{"batches": [...]}` ("-" for stdin)
    pub batches: PathBuf,

    /// Override the sink write timeout (milliseconds)
    #[arg(long, env = "BATCH_RELAY_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Output the dispatch report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
