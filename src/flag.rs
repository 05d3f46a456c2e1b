//! Per-participant "evaluation in flight" state.
//!
//! The flag is owned by the game logic and shared with the evaluator. It is
//! only ever set through `try_acquire`, and the returned guard clears it when
//! dropped, so every exit path of a round (including a panic) releases it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking that a participant is being evaluated.
#[derive(Debug, Clone, Default)]
pub struct SuspicionFlag {
    in_flight: Arc<AtomicBool>,
}

impl SuspicionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Sets the flag, returning a guard that clears it on drop. Returns
    /// `None` if the flag was already set.
    pub fn try_acquire(&self) -> Option<SuspicionGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SuspicionGuard {
                in_flight: Arc::clone(&self.in_flight),
            })
    }
}

/// Holds a participant's flag for the duration of one round.
#[derive(Debug)]
pub struct SuspicionGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SuspicionGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
