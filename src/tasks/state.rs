//! # Task lifecycle state.
//!
//! ```text
//! Created ──► Running ──┬──► Completed
//!    │                  ├──► Cancelled
//!    │                  ├──► Failed
//!    │                  └──► Aborted     (ignored its token past the shutdown grace)
//!    └─────────────────────► Cancelled   (token fired before the permit was granted)
//! ```
//!
//! Terminal states are final: [`StateCell`] refuses any transition out of them.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::watch;

/// Lifecycle state of a supervised task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Registered, waiting for a concurrency permit.
    Created = 0,
    /// Work is executing.
    Running = 1,
    /// Work finished on its own.
    Completed = 2,
    /// Work stopped because its token fired.
    Cancelled = 3,
    /// Work returned an error.
    Failed = 4,
    /// Work was still running when shutdown's grace elapsed and was aborted.
    Aborted = 5,
}

impl TaskState {
    /// Returns `true` for every state except `Created` and `Running`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Created | TaskState::Running)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Cancelled,
            4 => TaskState::Failed,
            _ => TaskState::Aborted,
        }
    }
}

/// Shared, monotonic state holder with change notification.
#[derive(Debug)]
pub(crate) struct StateCell {
    raw: AtomicU8,
    tx: watch::Sender<TaskState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(TaskState::Created);
        Self {
            raw: AtomicU8::new(TaskState::Created as u8),
            tx,
        }
    }

    pub(crate) fn get(&self) -> TaskState {
        TaskState::from_u8(self.raw.load(Ordering::Acquire))
    }

    /// Moves to `next` unless already terminal. Returns `true` on success.
    pub(crate) fn set(&self, next: TaskState) -> bool {
        let mut current = self.raw.load(Ordering::Acquire);
        loop {
            if TaskState::from_u8(current).is_terminal() {
                return false;
            }
            match self.raw.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.tx.send_replace(next);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.tx.subscribe()
    }
}
