//! Completion handles for submitted commands.
//!
//! `Event::wait` is the sole blocking operation in the facade: a true
//! OS-level block on a condvar until the queue worker completes the command.
//! There is no cancellation and no built-in timeout; callers needing a
//! bounded wait layer their own.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{ExecutionSnafu, Result};

/// Timing of one completed command, in nanoseconds since queue creation.
///
/// Recorded only on queues created with profiling enabled. All three
/// timestamps are non-negative and non-decreasing in the order
/// queued → started → finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandProfile {
    pub queued_at: u64,
    pub started_at: u64,
    pub finished_at: u64,
}

enum Slot<T> {
    Pending,
    Done { result: Result<T, String>, profile: Option<CommandProfile> },
}

pub(crate) struct EventState<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
}

impl<T: Clone> EventState<T> {
    pub(crate) fn new() -> Self {
        Self { slot: Mutex::new(Slot::Pending), cond: Condvar::new() }
    }

    /// Complete the command. Idempotent: the first completion wins.
    pub(crate) fn complete(&self, result: Result<T, String>, profile: Option<CommandProfile>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Done { result, profile };
            self.cond.notify_all();
        }
    }
}

/// Handle representing the eventual completion of one submitted command.
///
/// `T` is the command's result payload: `()` for launches and writes,
/// the host-visible bytes for read-back.
pub struct Event<T = ()> {
    state: Arc<EventState<T>>,
}

impl<T: Clone> Event<T> {
    pub(crate) fn new() -> (Self, Arc<EventState<T>>) {
        let state = Arc::new(EventState::new());
        (Self { state: Arc::clone(&state) }, state)
    }

    /// Block the calling thread until the command completes, then return its
    /// payload, or the device-reported fault as
    /// [`crate::Error::Execution`].
    pub fn wait(&self) -> Result<T> {
        let mut slot = self.state.slot.lock();
        while matches!(*slot, Slot::Pending) {
            self.state.cond.wait(&mut slot);
        }

        match &*slot {
            Slot::Done { result: Ok(payload), .. } => Ok(payload.clone()),
            Slot::Done { result: Err(reason), .. } => ExecutionSnafu { reason: reason.clone() }.fail(),
            Slot::Pending => unreachable!("woken while pending"),
        }
    }

    /// Whether the command has completed, without blocking.
    pub fn is_complete(&self) -> bool {
        !matches!(*self.state.slot.lock(), Slot::Pending)
    }

    /// Timing of the completed command. `None` until completion, and always
    /// `None` on queues created without profiling.
    pub fn profile(&self) -> Option<CommandProfile> {
        match &*self.state.slot.lock() {
            Slot::Done { profile, .. } => *profile,
            Slot::Pending => None,
        }
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let complete = !matches!(*self.state.slot.lock(), Slot::Pending);
        f.debug_struct("Event").field("complete", &complete).finish()
    }
}
