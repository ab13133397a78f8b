//! # Task abstraction.
//!
//! A [`Task`] receives a [`Token`] and must race it at every blocking point
//! (timer, channel receive, I/O). A task that never observes its token cannot
//! be stopped; the supervisor only detects it when shutdown's grace elapses.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{cancel::Token, error::TaskError};

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancellable unit of work.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use lifeline::{Task, TaskError, Token};
///
/// struct Poller;
///
/// #[async_trait]
/// impl Task for Poller {
///     fn name(&self) -> &str { "poller" }
///
///     async fn run(&self, ctx: Token) -> Result<(), TaskError> {
///         loop {
///             tokio::select! {
///                 _ = ctx.cancelled() => return Ok(()),
///                 _ = tokio::time::sleep(Duration::from_millis(100)) => { /* poll */ }
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task until completion or cancellation.
    async fn run(&self, ctx: Token) -> Result<(), TaskError>;
}
