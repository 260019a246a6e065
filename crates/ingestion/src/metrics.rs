//! Ingestion metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total messages appended to the queue
    pub messages_appended: AtomicU64,

    /// Total messages removed by `take_all`
    pub messages_taken: AtomicU64,

    /// Queue length observed at the last append/take
    pub queue_len: AtomicUsize,

    /// Source lines that could not be decoded
    pub parse_errors: AtomicU64,

    /// Source records rejected for missing fields
    pub rejected: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one appended message
    pub fn record_appended(&self) {
        self.messages_appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a drained snapshot
    pub fn record_taken(&self, count: usize) {
        self.messages_taken.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record parse error
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected record
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_appended: self.messages_appended.load(Ordering::Relaxed),
            messages_taken: self.messages_taken.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub messages_appended: u64,
    pub messages_taken: u64,
    pub queue_len: usize,
    pub parse_errors: u64,
    pub rejected: u64,
}
