//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Requests waiting for the worker
    queue_len: AtomicUsize,
    /// Batch sets accepted by the sink
    delivered_count: AtomicU64,
    /// Batch sets the sink rejected or failed on
    failure_count: AtomicU64,
    /// Batch sets abandoned because the sink exceeded the timeout
    timeout_count: AtomicU64,
    /// Batch sets refused because the worker queue was full
    dropped_count: AtomicU64,
    /// Messages carried by delivered batch sets
    messages_delivered: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Record a successful delivery carrying `messages` messages
    pub fn record_delivered(&self, messages: usize) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
        self.messages_delivered
            .fetch_add(messages as u64, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timeout_count(&self) -> u64 {
        self.timeout_count.load(Ordering::Relaxed)
    }

    pub fn inc_timeout_count(&self) {
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_delivered(&self) -> u64 {
        self.messages_delivered.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            timeout_count: self.timeout_count(),
            dropped_count: self.dropped_count(),
            messages_delivered: self.messages_delivered(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub dropped_count: u64,
    pub messages_delivered: u64,
}
