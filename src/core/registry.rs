//! # Task registry.
//!
//! Owns the join handle and record of every task that has not finished yet.
//!
//! ## Architecture
//! ```text
//! Supervisor::spawn ──► Registry::insert_with(id → spawn runner) ──► HashMap<TaskId, Entry>
//!                                                                        ▲
//! runner exits ──────► Registry::remove(id) ─────────────────────────────┘
//!
//! Supervisor::shutdown ──► Registry::close_and_drain() ──► Vec<Entry>  (closed: no more inserts)
//! ```
//!
//! ## Rules
//! - Finished tasks remove themselves, so the map is bounded by the number of live tasks.
//! - Insertion and the `closed` check happen under one lock: nothing is registered after
//!   shutdown drained the map.
//! - The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::core::handle::TaskRecord;
use crate::tasks::{TaskId, TaskState};

/// Registered task: shared record plus the runner's join handle.
pub(crate) struct Entry {
    pub(crate) record: Arc<TaskRecord>,
    pub(crate) join: JoinHandle<TaskState>,
}

struct Inner {
    tasks: HashMap<TaskId, Entry>,
    closed: bool,
}

/// Live-task registry.
pub(crate) struct Registry {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                tasks: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
        })
    }

    /// Allocates an id and registers whatever `make` spawns for it.
    ///
    /// Returns `None` (without calling `make`) once the registry is closed.
    pub(crate) fn insert_with<F>(&self, make: F) -> Option<Arc<TaskRecord>>
    where
        F: FnOnce(TaskId) -> Entry,
    {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = make(id);
        let record = Arc::clone(&entry.record);
        inner.tasks.insert(id, entry);
        Some(record)
    }

    /// Forgets a finished task.
    pub(crate) fn remove(&self, id: TaskId) {
        self.inner.lock().tasks.remove(&id);
    }

    /// Refuses further inserts and hands out every live entry, sorted by id.
    pub(crate) fn close_and_drain(&self) -> Vec<Entry> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let mut entries: Vec<Entry> = inner.tasks.drain().map(|(_, e)| e).collect();
        entries.sort_unstable_by_key(|e| e.record.id);
        entries
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Sorted ids of live tasks.
    pub(crate) fn ids(&self) -> Vec<TaskId> {
        let inner = self.inner.lock();
        let mut ids: Vec<TaskId> = inner.tasks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }
}
