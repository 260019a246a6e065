//! Relay metrics
//!
//! Prometheus recording helpers plus an in-memory aggregator for the
//! end-of-run summary.

use std::collections::BTreeMap;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Record one flush attempt
///
/// `outcome` is one of `skipped`, `empty`, `dispatched`, `failed`, `aborted`.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_flush_cycle;
///
/// let outcome = scheduler.flush_once().await;
/// record_flush_cycle(outcome.as_str(), started.elapsed());
/// ```
pub fn record_flush_cycle(outcome: &str, duration: Duration) {
    counter!("relay_flush_cycles_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("relay_flush_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Record the size of a dispatched batch set
pub fn record_batch_set(batches: usize, messages: usize) {
    histogram!("relay_batch_set_batches").record(batches as f64);
    histogram!("relay_batch_set_messages").record(messages as f64);
}

/// Record pending queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("relay_queue_depth").set(depth as f64);
}

/// Record a direct submission
pub fn record_submission(operation: &str, accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!(
        "relay_submissions_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Flush cycle aggregator
///
/// Aggregates flush outcomes in memory for reporting.
#[derive(Debug, Clone, Default)]
pub struct FlushStatsAggregator {
    /// Attempts per outcome label
    pub outcomes: BTreeMap<String, u64>,

    /// Messages delivered by dispatched cycles
    pub messages_delivered: u64,

    /// Messages taken by cycles whose dispatch failed
    pub messages_dropped: u64,

    /// Cycle duration (ms), skipped attempts excluded
    pub duration_stats: RunningStats,

    /// Messages per dispatched batch set
    pub batch_set_stats: RunningStats,
}

impl FlushStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one flush attempt into the totals
    pub fn update(&mut self, outcome: &str, messages: usize, duration: Duration) {
        *self.outcomes.entry(outcome.to_string()).or_insert(0) += 1;

        match outcome {
            "dispatched" => {
                self.messages_delivered += messages as u64;
                self.batch_set_stats.push(messages as f64);
            }
            "failed" => self.messages_dropped += messages as u64,
            _ => {}
        }

        if outcome != "skipped" {
            self.duration_stats.push(duration.as_secs_f64() * 1000.0);
        }
    }

    /// Attempts recorded with the given outcome
    pub fn count(&self, outcome: &str) -> u64 {
        self.outcomes.get(outcome).copied().unwrap_or(0)
    }

    /// Generate summary report
    pub fn summary(&self) -> FlushSummary {
        let attempts: u64 = self.outcomes.values().sum();
        let dispatched = self.count("dispatched");
        let failed = self.count("failed") + self.count("aborted");

        FlushSummary {
            attempts,
            dispatched,
            empty: self.count("empty"),
            skipped: self.count("skipped"),
            failed,
            messages_delivered: self.messages_delivered,
            messages_dropped: self.messages_dropped,
            failure_rate: if dispatched + failed > 0 {
                failed as f64 / (dispatched + failed) as f64 * 100.0
            } else {
                0.0
            },
            duration_ms: StatsSummary::from(&self.duration_stats),
            batch_set_messages: StatsSummary::from(&self.batch_set_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Flush summary
#[derive(Debug, Clone, Default)]
pub struct FlushSummary {
    pub attempts: u64,
    pub dispatched: u64,
    pub empty: u64,
    pub skipped: u64,
    pub failed: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
    pub failure_rate: f64,
    pub duration_ms: StatsSummary,
    pub batch_set_messages: StatsSummary,
}

impl std::fmt::Display for FlushSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Flush Summary ===")?;
        writeln!(f, "Flush attempts: {}", self.attempts)?;
        writeln!(
            f,
            "Dispatched: {}, empty: {}, skipped: {}",
            self.dispatched, self.empty, self.skipped
        )?;
        writeln!(f, "Failed: {} ({:.2}%)", self.failed, self.failure_rate)?;
        writeln!(f, "Messages delivered: {}", self.messages_delivered)?;
        writeln!(f, "Messages dropped: {}", self.messages_dropped)?;
        writeln!(f, "Cycle duration (ms): {}", self.duration_ms)?;
        writeln!(f, "Messages per batch set: {}", self.batch_set_messages)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
