//! Error types used by the lifeline runtime and by supervised work.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors raised by the supervisor itself.
//! - [`TaskError`]: errors returned by individual task runs.
//!
//! Cancellation and deadlines are *signals*, not errors: a task that stops because
//! its [`Token`](crate::Token) fired ends in [`TaskState::Cancelled`](crate::TaskState),
//! and the supervisor never reports it as a failure.
//!
//! Both types provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::core::StuckTask;

/// # Errors produced by the supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period elapsed while some tasks were still running.
    ///
    /// The listed tasks never observed their token; they were aborted after the report.
    #[error("shutdown grace {grace:?} exceeded; leaked: {stuck:?}")]
    GraceExceeded {
        /// The grace duration that was waited.
        grace: Duration,
        /// Tasks that were still running when the grace period elapsed, sorted by id.
        stuck: Vec<StuckTask>,
    },

    /// The supervisor already started shutting down and refuses new work.
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lifeline::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::ShuttingDown => "runtime_shutting_down",
        }
    }

    /// Returns the leaked tasks, if this error reports any.
    pub fn stuck(&self) -> &[StuckTask] {
        match self {
            RuntimeError::GraceExceeded { stuck, .. } => stuck,
            RuntimeError::ShuttingDown => &[],
        }
    }
}

/// # Errors returned by a task run.
///
/// Any variant ends the task in [`TaskState::Failed`](crate::TaskState), except
/// [`TaskError::Canceled`], which ends it in `Cancelled`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The run exceeded its per-run timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The work reported a failure.
    #[error("execution failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// An I/O operation inside the work failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The task noticed its token and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Failed`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lifeline::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Failed { .. } => "task_failed",
            TaskError::Io(_) => "task_io",
            TaskError::Canceled => "task_canceled",
        }
    }
}
