//! # Relay
//!
//! Inbound operations of the batch relay.
//!
//! - `submit_message`: validate and queue one message for the next flush cycle
//! - `submit_batches`: validate a pre-aggregated batch set and forward it immediately

mod error;
mod service;

pub use error::{RelayError, Result};
pub use service::RelayService;
