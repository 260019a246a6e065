//! # Ingestion
//!
//! Message ingestion module.
//!
//! Responsibilities:
//! - Hold pending messages in a concurrency-safe `MessageQueue`
//! - Hand the whole queue to the flush cycle with an atomic `take_all`
//! - Feed the queue from line-delimited JSON readers or a mock generator,
//!   through any `MessageIntake`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{JsonLinesSource, MessageQueue};
//! use std::sync::Arc;
//!
//! let queue = Arc::new(MessageQueue::new());
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! let stats = JsonLinesSource::new("stdin", stdin).run(queue.clone()).await?;
//!
//! let snapshot = queue.take_all();
//! ```
//!
//! The queue is unbounded: producers are never told to slow down.

mod error;
mod intake;
mod jsonl;
mod metrics;
mod mock;
mod queue;

// Re-exports
pub use contracts::Message;
pub use error::{IngestionError, Result};
pub use intake::MessageIntake;
pub use jsonl::{decode_line, JsonLinesSource, SourceStats};
pub use crate::metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::{MockMessageSource, MockSourceConfig};
pub use queue::MessageQueue;
