//! # Lifecycle events emitted by the supervisor, runners and caches.
//!
//! The [`EventKind`] enum classifies events across four categories:
//! - **Task lifecycle**: spawned, starting, completed, cancelled, failed, timeout
//! - **Shutdown**: requested, all stopped, grace exceeded, leaked task
//! - **Cache**: sweep results
//! - **Subscriber**: overflow and panic reports
//!
//! Events are plain data: cheap to clone, `Arc<str>` for every string field.
//! `seq` is process-wide and strictly increasing, so subscribers can order events
//! that reached them through different queues.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifeline::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("fetch")
//!     .with_reason("connection refused")
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("fetch"));
//! assert_eq!(ev.timeout_ms, Some(5000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::TaskId;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets `task` (subscriber name) and `reason` (`full` / `closed`).
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown started; every owned token is about to be cancelled.
    ShutdownRequested,

    /// All tasks reached a terminal state within the grace period.
    AllStoppedWithin,

    /// Grace period elapsed with tasks still running.
    ///
    /// Sets `count` (number of leaked tasks) and `timeout_ms` (the grace).
    GraceExceeded,

    /// One task that overran the grace period.
    ///
    /// Sets `task`, `task_id`.
    TaskLeaked,

    // === Task lifecycle events ===
    /// Task registered with the supervisor.
    ///
    /// Sets `task`, `task_id`.
    TaskSpawned,

    /// Task acquired its concurrency permit and starts running.
    ///
    /// Sets `task`, `task_id`.
    TaskStarting,

    /// Task finished its own work.
    ///
    /// Sets `task`, `task_id`.
    TaskCompleted,

    /// Task stopped because its token fired.
    ///
    /// Sets `task`, `task_id`, and `reason` (`cancelled` / `deadline_exceeded`).
    TaskCancelled,

    /// Task returned an error.
    ///
    /// Sets `task`, `task_id`, `reason`.
    TaskFailed,

    /// Task exceeded its per-run timeout (always followed by `TaskFailed`).
    ///
    /// Sets `task`, `task_id`, `timeout_ms`.
    TimeoutHit,

    // === Cache events ===
    /// A sweep pass removed expired entries.
    ///
    /// Sets `task` (cache name) and `count` (entries removed).
    CacheSwept,
}

/// One lifecycle event.
///
/// Which optional fields are set depends on [`EventKind`]; see each variant.
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide sequence number.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// Name of the task, cache or subscriber, if applicable.
    pub task: Option<Arc<str>>,
    /// Task id, if applicable.
    pub task_id: Option<TaskId>,
    /// Error text, cancel reason or overflow detail.
    pub reason: Option<Arc<str>>,
    /// Timeout or grace in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Generic counter (removed entries, leaked tasks).
    pub count: Option<u64>,
}

impl Event {
    /// Stamps a new event with the next `seq` and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed) + 1,
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            reason: None,
            timeout_ms: None,
            count: None,
        }
    }

    /// Sets `reason`.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets `task`.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Sets `timeout_ms`, saturating at `u32::MAX`.
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(u32::try_from(d.as_millis()).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// `SubscriberOverflow` for `subscriber`; `why` is `full` or `closed`.
    pub fn subscriber_overflow(subscriber: &'static str, why: &'static str) -> Self {
        Self::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(why)
    }

    /// `SubscriberPanicked` for `subscriber` with the panic message.
    pub fn subscriber_panicked(subscriber: &'static str, message: String) -> Self {
        Self::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(message)
    }

    /// Returns `true` for the last event a task produces.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskCompleted
                | EventKind::TaskCancelled
                | EventKind::TaskFailed
                | EventKind::TaskLeaked
        )
    }
}
