//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::FlushStatsAggregator;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Messages appended to the queue
    pub messages_ingested: u64,

    /// Input lines read (or mock messages generated)
    pub lines_read: u64,

    /// Input lines skipped as malformed or invalid
    pub lines_skipped: u64,

    /// Lines that were not valid JSON messages
    pub parse_errors: u64,

    /// Lines rejected for an empty destination
    pub rejected: u64,

    /// Messages still queued after shutdown
    pub messages_pending: usize,

    /// Timer ticks handled
    pub cycles: u64,

    /// Outcome of the final drain, if one ran
    pub drain: Option<&'static str>,

    /// Total duration of the run
    pub duration: Duration,

    /// Number of sinks receiving flushed batch sets
    pub active_sinks: usize,

    /// Per-sink delivery counters
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    /// Flush cycle aggregator
    pub flush: FlushStatsAggregator,
}

impl PipelineStats {
    /// Messages ingested per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_ingested as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Relay Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages ingested: {}", self.messages_ingested);
        println!("   ├─ Throughput: {:.2} msg/s", self.throughput());
        println!("   ├─ Input lines read: {}", self.lines_read);
        println!(
            "   ├─ Input lines skipped: {} (parse errors: {}, rejected: {})",
            self.lines_skipped, self.parse_errors, self.rejected
        );
        println!("   ├─ Pending at exit: {}", self.messages_pending);
        println!("   └─ Active sinks: {}", self.active_sinks);

        let summary = self.flush.summary();

        println!("\n📈 Flush Cycles");
        println!("   ├─ Timer ticks: {}", self.cycles);
        println!(
            "   ├─ Dispatched: {}, empty: {}, skipped: {}",
            summary.dispatched, summary.empty, summary.skipped
        );
        println!(
            "   ├─ Failed: {} ({:.2}%)",
            summary.failed, summary.failure_rate
        );
        println!("   ├─ Messages delivered: {}", summary.messages_delivered);
        println!("   ├─ Messages dropped: {}", summary.messages_dropped);
        println!("   ├─ Cycle duration (ms): {}", summary.duration_ms);
        println!("   └─ Final drain: {}", self.drain.unwrap_or("disabled"));

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Sinks");
            for (name, metrics) in &self.sink_metrics {
                println!(
                    "   ├─ {}: delivered={}, failed={}, timed out={}, refused={}",
                    name,
                    metrics.delivered_count,
                    metrics.failure_count,
                    metrics.timeout_count,
                    metrics.dropped_count
                );
            }
        }

        println!();
    }
}
