//! # LogWriter: forwards lifecycle events to `tracing`.
//!
//! Leaks and failures are logged at `warn`, shutdown milestones at `info`,
//! routine lifecycle at `debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG lifeline: task spawned task="ticker" id=3
//! INFO  lifeline: shutdown requested
//! WARN  lifeline: task leaked task="stubborn" id=7
//! WARN  lifeline: grace exceeded leaked=1 grace_ms=200
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed event writer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let id = e.task_id.map(|id| id.get());
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskSpawned => debug!(target: "lifeline", task, ?id, "task spawned"),
            EventKind::TaskStarting => debug!(target: "lifeline", task, ?id, "task starting"),
            EventKind::TaskCompleted => debug!(target: "lifeline", task, ?id, "task completed"),
            EventKind::TaskCancelled => {
                debug!(target: "lifeline", task, ?id, reason, "task cancelled")
            }
            EventKind::TaskFailed => warn!(target: "lifeline", task, ?id, reason, "task failed"),
            EventKind::TimeoutHit => {
                warn!(target: "lifeline", task, ?id, timeout_ms = ?e.timeout_ms, "task timed out")
            }
            EventKind::TaskLeaked => warn!(target: "lifeline", task, ?id, "task leaked"),
            EventKind::ShutdownRequested => info!(target: "lifeline", "shutdown requested"),
            EventKind::AllStoppedWithin => {
                info!(target: "lifeline", "all tasks stopped within grace")
            }
            EventKind::GraceExceeded => warn!(
                target: "lifeline",
                leaked = ?e.count,
                grace_ms = ?e.timeout_ms,
                "grace exceeded"
            ),
            EventKind::CacheSwept => {
                debug!(target: "lifeline", cache = task, removed = ?e.count, "cache swept")
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "lifeline", subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "lifeline", subscriber = task, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
