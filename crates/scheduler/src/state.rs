//! Idle/Flushing state machine guarding the flush cycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight flag shared by every flush trigger
///
/// `false` is Idle, `true` is Flushing.
#[derive(Debug, Default)]
pub struct FlushState {
    flushing: AtomicBool,
}

impl FlushState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move Idle -> Flushing
    ///
    /// Returns `None` if a flush is already in progress. The state returns
    /// to Idle when the guard is dropped, including during a panic unwind.
    pub fn try_begin(self: &Arc<Self>) -> Option<FlushGuard> {
        self.flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard {
                state: Arc::clone(self),
            })
    }

    /// Whether a flush is in progress
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }
}

/// Proof of holding the Flushing state
#[derive(Debug)]
pub struct FlushGuard {
    state: Arc<FlushState>,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.state.flushing.store(false, Ordering::Release);
    }
}
