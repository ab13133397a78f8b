//! # Run one supervised task to a terminal state.
//!
//! ## Flow
//! ```text
//! acquire permit (optional) ──┬─ token fired ─► Cancelled
//!                             └─ granted ──► Running ─► publish TaskStarting
//!                                              │
//!                                    task.run(child token) [with optional timeout]
//!                                              │
//!   Ok, token still live           ─► Completed  (TaskCompleted)
//!   Ok after token fired / Canceled ─► Cancelled  (TaskCancelled)
//!   timeout                         ─► TimeoutHit + Failed (TaskFailed)
//!   other error                     ─► Failed     (TaskFailed)
//! ```
//!
//! ## Rules
//! - Publishes **exactly one** terminal event per task.
//! - The permit is held for the whole run and released on every exit path.
//! - On timeout the child token is cancelled and the work future is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::Semaphore, time};
use tracing::debug;

use crate::{
    cancel::{CancelReason, Token},
    core::handle::TaskRecord,
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::{Task, TaskState},
};

/// Everything one run needs.
pub(crate) struct RunContext {
    pub(crate) record: Arc<TaskRecord>,
    pub(crate) task: Arc<dyn Task>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) semaphore: Option<Arc<Semaphore>>,
    pub(crate) bus: Bus,
}

/// Drives the task to a terminal state and returns it.
pub(crate) async fn run_task(ctx: RunContext) -> TaskState {
    let RunContext {
        record,
        task,
        timeout,
        semaphore,
        bus,
    } = ctx;
    let token = &record.token;

    let _permit = match semaphore {
        Some(sem) => {
            let acquired = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                res = sem.acquire_owned() => res.ok(),
            };
            match acquired {
                Some(permit) => Some(permit),
                None => return finish(&record, &bus, TaskState::Cancelled, None),
            }
        }
        None => None,
    };

    record.state.set(TaskState::Running);
    publish(&bus, &record, EventKind::TaskStarting);

    let res = run_once(task.as_ref(), token, timeout, &record, &bus).await;

    match res {
        Ok(()) if token.is_cancelled() => finish(&record, &bus, TaskState::Cancelled, None),
        Ok(()) => finish(&record, &bus, TaskState::Completed, None),
        Err(TaskError::Canceled) => finish(&record, &bus, TaskState::Cancelled, None),
        Err(e) => finish(&record, &bus, TaskState::Failed, Some(e)),
    }
}

/// Executes the work once with an optional timeout.
async fn run_once(
    task: &dyn Task,
    token: &Token,
    timeout: Option<Duration>,
    record: &TaskRecord,
    bus: &Bus,
) -> Result<(), TaskError> {
    let child = token.child_token();

    if let Some(dur) = timeout.filter(|d| *d > Duration::ZERO) {
        match time::timeout(dur, task.run(child.clone())).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_task(Arc::clone(&record.name))
                        .with_task_id(record.id)
                        .with_timeout(dur),
                );
                Err(TaskError::Timeout { timeout: dur })
            }
        }
    } else {
        task.run(child).await
    }
}

fn finish(record: &TaskRecord, bus: &Bus, state: TaskState, err: Option<TaskError>) -> TaskState {
    if !record.state.set(state) {
        return record.state.get();
    }

    let event = match (state, err) {
        (TaskState::Cancelled, _) => {
            let reason = match record.token.reason() {
                Some(CancelReason::DeadlineExceeded) => "deadline_exceeded",
                _ => "cancelled",
            };
            event_for(record, EventKind::TaskCancelled).with_reason(reason)
        }
        (TaskState::Failed, Some(e)) => {
            event_for(record, EventKind::TaskFailed).with_reason(e.to_string())
        }
        (TaskState::Failed, None) => event_for(record, EventKind::TaskFailed),
        _ => event_for(record, EventKind::TaskCompleted),
    };
    debug!(task = %record.name, id = record.id.get(), ?state, "task finished");
    bus.publish(event);
    state
}

fn event_for(record: &TaskRecord, kind: EventKind) -> Event {
    Event::new(kind)
        .with_task(Arc::clone(&record.name))
        .with_task_id(record.id)
}

fn publish(bus: &Bus, record: &TaskRecord, kind: EventKind) {
    bus.publish(event_for(record, kind));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskFn, TaskId};

    fn ctx(task: Arc<dyn Task>, token: Token, timeout: Option<Duration>, bus: &Bus) -> RunContext {
        RunContext {
            record: TaskRecord::new(TaskId::new(1), Arc::from(task.name()), token),
            task,
            timeout,
            semaphore: None,
            bus: bus.clone(),
        }
    }

    #[tokio::test]
    async fn completes_and_publishes_one_terminal_event() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = TaskFn::arc("ok", |_t: Token| async { Ok(()) });

        let state = run_task(ctx(task, Token::new(), None, &bus)).await;
        assert_eq!(state, TaskState::Completed);

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskStarting);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskCompleted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cooperative_exit_counts_as_cancelled() {
        let bus = Bus::new(16);
        let token = Token::new();
        let task = TaskFn::arc("loop", |t: Token| async move {
            t.cancelled().await;
            Ok(())
        });

        let run = tokio::spawn(run_task(ctx(task, token.clone(), None, &bus)));
        token.cancel();
        assert_eq!(run.await.unwrap(), TaskState::Cancelled);
    }

    #[tokio::test]
    async fn error_marks_failed() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = TaskFn::arc("bad", |_t: Token| async { Err(TaskError::fail("boom")) });

        assert_eq!(
            run_task(ctx(task, Token::new(), None, &bus)).await,
            TaskState::Failed
        );
        let _starting = rx.recv().await.unwrap();
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::TaskFailed);
        assert_eq!(failed.reason.as_deref(), Some("execution failed: boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_drops_work_and_fails() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = TaskFn::arc("slow", |_t: Token| async {
            std::future::pending::<()>().await;
            Ok(())
        });

        let state = run_task(ctx(task, Token::new(), Some(Duration::from_millis(50)), &bus)).await;
        assert_eq!(state, TaskState::Failed);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TaskStarting,
                EventKind::TimeoutHit,
                EventKind::TaskFailed
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_while_waiting_for_permit() {
        let bus = Bus::new(16);
        let sem = Arc::new(Semaphore::new(0));
        let token = Token::new();
        let task = TaskFn::arc("queued", |_t: Token| async { Ok(()) });

        let mut c = ctx(task, token.clone(), None, &bus);
        c.semaphore = Some(sem);
        let record = Arc::clone(&c.record);
        let run = tokio::spawn(run_task(c));

        tokio::task::yield_now().await;
        assert_eq!(record.state.get(), TaskState::Created);
        token.cancel();
        assert_eq!(run.await.unwrap(), TaskState::Cancelled);
    }
}
