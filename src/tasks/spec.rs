//! # Task specification for supervised execution.
//!
//! A spec can be created:
//! - **Explicitly** with [`TaskSpec::new`]
//! - **From config** with [`TaskSpec::with_defaults`] (inherits the default timeout)
//!
//! The spec is passed to [`Supervisor::spawn`](crate::Supervisor::spawn).

use std::time::Duration;

use crate::{core::SupervisorConfig, tasks::TaskRef};

/// Task plus how it should run under supervision.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use lifeline::{SupervisorConfig, TaskError, TaskFn, TaskRef, TaskSpec, Token};
///
/// let demo: TaskRef = TaskFn::arc("demo", |_ctx: Token| async move {
///     Ok::<(), TaskError>(())
/// });
///
/// let spec = TaskSpec::new(demo.clone(), Some(Duration::from_secs(1)));
/// assert_eq!(spec.timeout(), Some(Duration::from_secs(1)));
///
/// // `cfg.timeout = 0s` is treated as `None`
/// let spec = TaskSpec::with_defaults(demo, &SupervisorConfig::default());
/// assert!(spec.timeout().is_none());
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    timeout: Option<Duration>,
}

impl TaskSpec {
    /// Creates a spec with an explicit per-run timeout (`None` = no timeout).
    pub fn new(task: TaskRef, timeout: Option<Duration>) -> Self {
        Self { task, timeout }
    }

    /// Creates a spec inheriting the supervisor's default timeout.
    pub fn with_defaults(task: TaskRef, cfg: &SupervisorConfig) -> Self {
        Self {
            task,
            timeout: cfg.default_timeout(),
        }
    }

    /// Returns reference to the task.
    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the task name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Returns the timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns a new spec with updated timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
