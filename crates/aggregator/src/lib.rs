//! # Aggregator
//!
//! Destination-keyed aggregation.
//!
//! Two pure operations:
//! - `group_by_destination`: partition a queue snapshot into one `Batch` per destination
//! - `validate_no_duplicate_destinations`: check a pre-aggregated `BatchSet` before it is forwarded
//!
//! ## Usage Example
//!
//! ```ignore
//! use aggregator::group_by_destination;
//!
//! let snapshot = queue.take_all();
//! let batch_set = group_by_destination(snapshot);
//! dispatcher.send(batch_set).await?;
//! ```

mod group;
mod validate;

pub use contracts::{Batch, BatchMessage, BatchSet, ContractError, Message};
pub use group::group_by_destination;
pub use validate::validate_no_duplicate_destinations;
