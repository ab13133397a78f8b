//! # lifeline
//!
//! **Lifeline** provides leak-safe lifecycle primitives for async Rust services.
//!
//! Every long-lived thing (a background task, a timer, a cache entry, an open
//! resource) has an owner and a bounded lifetime. Cancellation propagates through
//! a tree of [`Token`]s, caches shed expired entries on their own, and a
//! [`Supervisor`] shuts everything down within a grace period and names what
//! refused to stop.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                          ┌──────────────────────────────┐
//!                          │  Supervisor                  │
//!                          │  - root Token                │
//!                          │  - Registry (live tasks)     │
//!                          │  - Semaphore (max_concurrent)│
//!                          │  - Bus + subscriber listener │
//!                          └──┬───────────┬────────────┬──┘
//!               child tokens  │           │            │ sweeper task
//!                 ┌───────────┘           │            └───────────┐
//!                 ▼                       ▼                        ▼
//!          ┌──────────────┐       ┌──────────────┐        ┌─────────────────┐
//!          │  runner #1   │       │  runner #2   │        │ BoundedCache    │
//!          │ task.run(tk) │       │ task.run(tk) │        │ Ticker → sweep  │
//!          └──────┬───────┘       └──────┬───────┘        └────────┬────────┘
//!                 │ TaskStarting/Completed/Cancelled/Failed        │ CacheSwept
//!                 ▼                       ▼                        ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                          Bus (broadcast channel)                          │
//! └────────────────────────────────────┬──────────────────────────────────────┘
//!                                      ▼
//!                        SubscriberSet (per-subscriber queues)
//!                           ├──► LogWriter (tracing)
//!                           └──► custom Subscribe impls
//! ```
//!
//! ### Lifecycle
//! ```text
//! spawn(spec) ──► Created ──► (permit) ──► Running ──┬──► Completed
//!                    │                               ├──► Cancelled   (token fired)
//!                    │                               ├──► Failed      (error / timeout)
//!                    │                               └──► Aborted     (ignored token past grace)
//!                    └──────────── token fired ─────────► Cancelled
//!
//! shutdown(grace):
//!   ShutdownRequested ─► cancel root + every task token ─► wait ≤ grace
//!     ├─ all terminal ─► AllStoppedWithin ─► Ok(())
//!     └─ some running ─► TaskLeaked × n ─► GraceExceeded ─► Err(GraceExceeded { stuck })
//! ```
//!
//! ## Features
//! | Area             | Description                                                        | Key types / functions                        |
//! |------------------|--------------------------------------------------------------------|----------------------------------------------|
//! | **Cancellation** | Hierarchical tokens with deadlines and a recorded reason.          | [`Token`], [`CancelReason`], [`TokenGuard`]  |
//! | **Supervision**  | Spawn, track and shut down tasks in bounded time.                  | [`Supervisor`], [`TaskHandle`], [`StuckTask`]|
//! | **Tasks**        | Define work as trait objects or closures.                          | [`Task`], [`TaskFn`], [`TaskSpec`]           |
//! | **Caching**      | TTL-bounded key/value store with an owned sweeper.                 | [`BoundedCache`], [`CacheConfig`]            |
//! | **Timers**       | Tickers and one-shot timers that stop with their token.            | [`Ticker`], [`Timer`]                        |
//! | **Scoping**      | Release resources per iteration and on every exit path.            | [`Lease`], [`acquire`], [`for_each_scoped`]  |
//! | **Events**       | Lifecycle events for logging and custom observers.                 | [`Event`], [`Subscribe`], [`LogWriter`]      |
//! | **Errors**       | Typed errors for the supervisor and for task runs.                 | [`RuntimeError`], [`TaskError`]              |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lifeline::{CacheConfig, LogWriter, Subscribe, Supervisor, SupervisorConfig, Token};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let sessions = sup.cache::<String, u64>(
//!         "sessions",
//!         CacheConfig::new(Duration::from_secs(60), Duration::from_secs(10)),
//!     )?;
//!     sessions.set("alice".to_string(), 1);
//!
//!     sup.spawn_fn("poller", |ctx: Token| async move {
//!         ctx.cancelled().await;
//!         Ok(())
//!     })?;
//!
//!     sup.shutdown(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

mod cache;
mod cancel;
mod core;
mod error;
mod events;
mod scope;
mod subscribers;
mod tasks;
mod timers;

// ---- Public re-exports ----

pub use cache::{BoundedCache, CacheConfig, CacheStats};
pub use cancel::{CancelReason, Token, TokenGuard};
pub use core::{StuckTask, Supervisor, SupervisorBuilder, SupervisorConfig, TaskHandle};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use scope::{Lease, acquire, for_each_scoped};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Task, TaskFn, TaskId, TaskRef, TaskSpec, TaskState};
pub use timers::{Ticker, Timer, TimerOutcome};
