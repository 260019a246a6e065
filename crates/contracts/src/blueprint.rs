//! RelayBlueprint - Config Loader output
//!
//! Describes the full relay configuration: flush schedule, dispatch policy, output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Flush schedule
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Dispatch policy
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Sinks receiving each flush cycle's batch set
    #[serde(default = "default_flush_sinks")]
    pub sinks: Vec<SinkConfig>,

    /// Sinks receiving directly submitted batch sets
    #[serde(default = "default_delivery_sinks")]
    pub delivery_sinks: Vec<SinkConfig>,
}

impl Default for RelayBlueprint {
    fn default() -> Self {
        Self {
            version: ConfigVersion::V1,
            scheduler: SchedulerConfig::default(),
            dispatch: DispatchConfig::default(),
            sinks: default_flush_sinks(),
            delivery_sinks: default_delivery_sinks(),
        }
    }
}

fn default_flush_sinks() -> Vec<SinkConfig> {
    vec![log_sink("flush_log")]
}

fn default_delivery_sinks() -> Vec<SinkConfig> {
    vec![log_sink("delivery_log")]
}

fn log_sink(name: &str) -> SinkConfig {
    SinkConfig {
        name: name.to_string(),
        sink_type: SinkType::Log,
        queue_capacity: default_queue_capacity(),
        params: HashMap::new(),
    }
}

/// Flush schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between flush cycles (milliseconds), must be > 0
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Run one final flush when shutting down
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            drain_on_shutdown: default_drain_on_shutdown(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_drain_on_shutdown() -> bool {
    true
}

/// Dispatch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on a single sink write (milliseconds), must be > 0
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Pending request capacity of the sink worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    16
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log every destination and its messages
    Log,
    /// Append JSON lines to a file
    File,
    /// POST the wire body to an HTTP endpoint
    Http,
}

impl SinkType {
    /// Parameters that must be present for this sink type
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Log => &[],
            Self::File => &["path"],
            Self::Http => &["endpoint"],
        }
    }
}
