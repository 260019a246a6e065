//! # Contracts
//!
//! Frozen interface contracts shared by every crate: the message/batch data model,
//! the wire representation, the sink trait, errors, and the configuration blueprint.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Ownership Model
//! - A `Message` lives in exactly one container at a time (queue or batch)
//! - A `BatchSet` is consumed once by a dispatcher and not retained

mod blueprint;
mod error;
mod message;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use message::*;
pub use sink::*;
