//! # Task abstractions and specifications.
//!
//! - [`Task`] trait for async, token-observing work
//! - [`TaskFn`] closure-backed implementation
//! - [`TaskRef`] shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] task plus its per-run timeout
//! - [`TaskId`], [`TaskState`] identity and lifecycle of a supervised task

mod id;
mod spec;
mod state;
mod task;
mod task_fn;

pub use id::TaskId;
pub use spec::TaskSpec;
pub use state::TaskState;
pub(crate) use state::StateCell;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
