//! # Supervised task records and user-facing handles.
//!
//! A [`TaskRecord`] is shared by the registry, the runner and every [`TaskHandle`].
//! It holds the task's identity, its [`Token`] and its [`TaskState`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::Token;
use crate::tasks::{StateCell, TaskId, TaskState};

/// Identity, token and state of one supervised task.
#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub(crate) id: TaskId,
    pub(crate) name: Arc<str>,
    pub(crate) started_at: Instant,
    pub(crate) token: Token,
    pub(crate) state: StateCell,
}

impl TaskRecord {
    pub(crate) fn new(id: TaskId, name: Arc<str>, token: Token) -> Arc<Self> {
        Arc::new(Self {
            id,
            name,
            started_at: Instant::now(),
            token,
            state: StateCell::new(),
        })
    }

    pub(crate) fn stuck(&self) -> StuckTask {
        StuckTask {
            id: self.id,
            name: Arc::clone(&self.name),
            running_for: self.started_at.elapsed(),
        }
    }
}

/// A task that did not reach a terminal state within shutdown's grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckTask {
    /// Task id.
    pub id: TaskId,
    /// Task name.
    pub name: Arc<str>,
    /// Time since the task was spawned.
    pub running_for: Duration,
}

/// Handle to a supervised task.
///
/// Dropping the handle does **not** stop the task; the supervisor still owns it.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    record: Arc<TaskRecord>,
}

impl TaskHandle {
    pub(crate) fn new(record: Arc<TaskRecord>) -> Self {
        Self { record }
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.record.id
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.record.state.get()
    }

    /// The token this task observes.
    pub fn token(&self) -> &Token {
        &self.record.token
    }

    /// Cancels this task only.
    pub fn cancel(&self) {
        self.record.token.cancel();
    }

    /// Time since the task was spawned.
    pub fn age(&self) -> Duration {
        self.record.started_at.elapsed()
    }

    /// Waits until the task reaches a terminal state.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.record.state.subscribe();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }
}
