//! # Dispatcher
//!
//! Outbound batch delivery.
//!
//! Responsibilities:
//! - Encode a `BatchSet` once into its JSON wire body
//! - Fan out to every configured sink, one request per sink
//! - Bound every sink write by the dispatch timeout and report failures

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{BatchSink, Envelope};
pub use dispatcher::{
    DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig, create_dispatcher,
    encode_body,
};
pub use error::{DispatcherError, SinkFailure};
pub use handle::{PendingDelivery, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, FileSinkConfig, HttpSink, HttpSinkConfig, LogSink};
