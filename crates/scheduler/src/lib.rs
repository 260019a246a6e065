//! # Scheduler
//!
//! Periodic flush of the message queue.
//!
//! Each cycle takes the whole queue, groups it by destination and hands the
//! batch set to the dispatcher. At most one cycle runs at a time; a trigger
//! that finds a cycle in progress is skipped.
//!
//! ## Usage Example
//!
//! ```ignore
//! use scheduler::BatchScheduler;
//!
//! let scheduler = BatchScheduler::new(queue, dispatcher, blueprint.scheduler.clone());
//! let handle = scheduler.spawn();
//!
//! tokio::signal::ctrl_c().await?;
//! let report = handle.shutdown().await;
//! ```

mod scheduler;
mod state;

pub use contracts::SchedulerConfig;
pub use scheduler::{BatchScheduler, FlushObserver, FlushOutcome, SchedulerHandle, ShutdownReport};
pub use state::{FlushGuard, FlushState};
