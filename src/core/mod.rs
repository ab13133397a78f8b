//! Runtime core: supervision and lifecycle.
//!
//! The public API from this module is [`Supervisor`] (with its builder and config),
//! [`TaskHandle`] and [`StuckTask`].
//!
//! Internal modules:
//! - [`runner`]: drives one task to a terminal state, with permit/timeout/cancellation;
//! - [`registry`]: live-task map, closed on shutdown;
//! - [`supervisor`]: spawning, owned caches, bounded shutdown;
//! - [`shutdown`]: OS signal handling.

mod builder;
mod config;
mod handle;
mod registry;
mod runner;
mod shutdown;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use handle::{StuckTask, TaskHandle};
pub use supervisor::Supervisor;
