//! # Supervisor: owns tasks, their tokens and caches, and shuts them down in bounded time.
//!
//! The [`Supervisor`] holds the root [`Token`], the task registry, the event [`Bus`]
//! and the subscriber listener. Every spawned task gets a child token; every cache
//! created through [`Supervisor::cache`] gets a supervised sweeper.
//!
//! ## Architecture
//! ```text
//! spawn(spec) ──► Registry::insert_with ──► tokio::spawn(run_task(ctx)) ──► state
//!                       │                              │
//!                       └─ closed? → ShuttingDown      └─ on exit: Registry::remove(id)
//!
//! Events:
//!   runners / sweepers / supervisor ── publish ──► Bus ──► listener ──► SubscriberSet::emit
//!
//! shutdown(grace):
//!   publish(ShutdownRequested)
//!     └─► root.cancel(), semaphore.close()
//!     └─► Registry::close_and_drain() → cancel every task token
//!     └─► await every runner against one deadline (now + grace)
//!            ├─ all joined          → publish(AllStoppedWithin)  → Ok(())
//!            └─ some still running  → abort + TaskLeaked per task
//!                                   → publish(GraceExceeded)     → Err(GraceExceeded { stuck })
//!     └─► stop listener (drain queued events, join subscriber workers)
//! ```
//!
//! ## Rules
//! - Shutdown never waits longer than `grace` for tasks (plus a short bounded listener drain).
//! - Nothing can be registered once shutdown drained the registry.
//! - Dropping the supervisor cancels the root token; tasks still need to observe it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifeline::{Supervisor, SupervisorConfig, Token};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::new(SupervisorConfig::default());
//!
//!     let handle = sup.spawn_fn("ticker", |ctx: Token| async move {
//!         while !ctx.is_cancelled() {
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!         }
//!         Ok(())
//!     })?;
//!
//!     sup.shutdown(Duration::from_secs(1)).await?;
//!     assert!(handle.state().is_terminal());
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{
    cache::{BoundedCache, CacheConfig, sweep_loop},
    cancel::{Token, deadline_after},
    core::{
        builder::SupervisorBuilder,
        config::SupervisorConfig,
        handle::{StuckTask, TaskHandle, TaskRecord},
        registry::{Entry, Registry},
        runner::{RunContext, run_task},
        shutdown,
    },
    error::{RuntimeError, TaskError},
    events::{Bus, Event, EventKind},
    subscribers::SubscriberSet,
    tasks::{TaskFn, TaskId, TaskSpec, TaskState},
    timers::Ticker,
};

/// Upper bound on waiting for subscribers to drain after shutdown.
const LISTENER_DRAIN: Duration = Duration::from_secs(1);

/// Owner of every supervised task and cache.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    root: Token,
    registry: Arc<Registry>,
    semaphore: Option<Arc<Semaphore>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    listener_stop: Token,
    shut_down: AtomicBool,
}

impl Supervisor {
    /// Creates a supervisor without subscribers.
    pub fn new(cfg: SupervisorConfig) -> Arc<Self> {
        Self::builder(cfg).build()
    }

    /// Starts a builder for a supervisor with subscribers.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subscribers: Option<SubscriberSet>,
    ) -> Self {
        let semaphore = cfg.concurrency_limit().map(Semaphore::new).map(Arc::new);
        let listener_stop = Token::new();
        let listener = subscribers.map(|set| {
            let rx = bus.subscribe();
            tokio::spawn(listen(rx, set, listener_stop.clone()))
        });

        Self {
            cfg,
            bus,
            root: Token::new(),
            registry: Registry::new(),
            semaphore,
            listener: Mutex::new(listener),
            listener_stop,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Configuration this supervisor was built with.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Receiver for every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// New token cancelled by shutdown (child of the root token).
    pub fn token(&self) -> Token {
        self.root.child_token()
    }

    /// New token cancelled by shutdown or after `timeout`, whichever comes first.
    pub fn token_with_timeout(&self, timeout: Duration) -> Token {
        self.root.child_with_timeout(timeout)
    }

    /// Registers and starts a task under the root token.
    pub fn spawn(&self, spec: TaskSpec) -> Result<TaskHandle, RuntimeError> {
        self.spawn_with_token(&self.root, spec)
    }

    /// Registers and starts a task under a child of `parent`.
    ///
    /// The task stops when `parent` fires or when the supervisor shuts down.
    /// A `parent` that already fired yields a task that ends `Cancelled`.
    pub fn spawn_with_token(
        &self,
        parent: &Token,
        spec: TaskSpec,
    ) -> Result<TaskHandle, RuntimeError> {
        let token = parent.child_token();
        let name: Arc<str> = Arc::from(spec.name());
        let registry = Arc::downgrade(&self.registry);

        let record = self
            .registry
            .insert_with(|id| {
                let record = TaskRecord::new(id, name, token);
                self.bus.publish(
                    Event::new(EventKind::TaskSpawned)
                        .with_task(Arc::clone(&record.name))
                        .with_task_id(id),
                );

                let ctx = RunContext {
                    record: Arc::clone(&record),
                    task: Arc::clone(spec.task()),
                    timeout: spec.timeout(),
                    semaphore: self.semaphore.clone(),
                    bus: self.bus.clone(),
                };
                let join = tokio::spawn(async move {
                    let state = run_task(ctx).await;
                    if let Some(registry) = registry.upgrade() {
                        registry.remove(id);
                    }
                    state
                });
                Entry { record, join }
            })
            .ok_or(RuntimeError::ShuttingDown)?;

        debug!(task = %record.name, id = record.id.get(), "task registered");
        Ok(TaskHandle::new(record))
    }

    /// Spawns a closure-backed task with the default timeout.
    pub fn spawn_fn<F, Fut>(
        &self,
        name: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Result<TaskHandle, RuntimeError>
    where
        F: Fn(Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let task = TaskFn::arc(name, f);
        self.spawn(TaskSpec::with_defaults(task, &self.cfg))
    }

    /// Spawns a task that calls `f` once per `period` until its token fires.
    ///
    /// The first call happens one period after the spawn. An error from `f` ends the task.
    pub fn spawn_periodic<F, Fut>(
        &self,
        name: impl Into<Cow<'static, str>>,
        period: Duration,
        f: F,
    ) -> Result<TaskHandle, RuntimeError>
    where
        F: Fn(Token) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let f = Arc::new(f);
        let task = TaskFn::arc(name, move |token: Token| {
            let f = Arc::clone(&f);
            async move {
                let mut ticker = Ticker::new(period, token.clone());
                while ticker.tick().await.is_some() {
                    f(token.clone()).await?;
                }
                Ok::<(), TaskError>(())
            }
        });
        self.spawn(TaskSpec::new(task, None))
    }

    /// Creates a named cache whose sweeper is a supervised task.
    ///
    /// The sweeper stops at shutdown or when the last cache handle is dropped;
    /// each pass that removes entries publishes `CacheSwept`.
    pub fn cache<K, V>(
        &self,
        name: &str,
        cfg: CacheConfig,
    ) -> Result<BoundedCache<K, V>, RuntimeError>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let cache = BoundedCache::build(name, cfg, Some(self.bus.clone()));
        let inner = cache.downgrade();
        let sweeper = TaskFn::arc(format!("cache-sweeper:{name}"), move |token: Token| {
            let inner = inner.clone();
            async move {
                sweep_loop(inner, token).await;
                Ok::<(), TaskError>(())
            }
        });
        self.spawn(TaskSpec::new(sweeper, None))?;
        Ok(cache)
    }

    /// Ids of tasks that have not finished yet, sorted.
    pub fn running(&self) -> Vec<TaskId> {
        self.registry.ids()
    }

    /// Number of tasks that have not finished yet.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` when no task is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.registry.is_closed()
    }

    /// Shuts down with [`SupervisorConfig::grace`].
    pub async fn shutdown_default(&self) -> Result<(), RuntimeError> {
        self.shutdown(self.cfg.grace).await
    }

    /// Waits for a termination signal, then shuts down with the default grace.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        if let Err(e) = shutdown::wait_for_shutdown_signal().await {
            warn!(error = %e, "signal registration failed; shutting down");
        }
        self.shutdown_default().await
    }

    /// Cancels everything and waits at most `grace` for tasks to stop.
    ///
    /// Tasks still running after `grace` are aborted and returned in
    /// [`RuntimeError::GraceExceeded`], sorted by id. Calling it again is a no-op.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let deadline = deadline_after(grace);

        info!(grace_ms = grace.as_millis() as u64, "shutdown requested");
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        self.root.cancel();
        if let Some(sem) = &self.semaphore {
            sem.close();
        }
        let entries = self.registry.close_and_drain();
        for entry in &entries {
            entry.record.token.cancel();
        }

        let stuck = self.join_until(entries, deadline).await;

        let res = if stuck.is_empty() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            warn!(leaked = stuck.len(), grace_ms = grace.as_millis() as u64, "grace exceeded");
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_count(stuck.len() as u64)
                    .with_timeout(grace),
            );
            Err(RuntimeError::GraceExceeded { grace, stuck })
        };

        self.stop_listener().await;
        res
    }

    /// Awaits every runner against `deadline`; aborts and reports the rest.
    ///
    /// A `None` deadline waits without limit.
    async fn join_until(&self, entries: Vec<Entry>, deadline: Option<Instant>) -> Vec<StuckTask> {
        let mut stuck = Vec::new();
        for Entry { record, mut join } in entries {
            let joined = match deadline {
                Some(at) => time::timeout_at(at, &mut join).await.is_ok(),
                None => {
                    let _ = (&mut join).await;
                    true
                }
            };
            if joined {
                continue;
            }
            join.abort();
            stuck.extend(self.report_leak(&record));
        }
        stuck
    }

    /// Marks `record` aborted and publishes `TaskLeaked`.
    ///
    /// Returns `None` when the runner reached a terminal state first.
    fn report_leak(&self, record: &TaskRecord) -> Option<StuckTask> {
        if !record.state.set(TaskState::Aborted) {
            return None;
        }
        warn!(task = %record.name, id = record.id.get(), "task leaked");
        self.bus.publish(
            Event::new(EventKind::TaskLeaked)
                .with_task(Arc::clone(&record.name))
                .with_task_id(record.id),
        );
        Some(record.stuck())
    }

    async fn stop_listener(&self) {
        self.listener_stop.cancel();
        let handle = self.listener.lock().take();
        let Some(mut handle) = handle else {
            return;
        };
        if time::timeout(LISTENER_DRAIN, &mut handle).await.is_err() {
            warn!("subscribers did not drain in time");
            handle.abort();
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.root.cancel();
        self.listener_stop.cancel();
    }
}

/// Forwards bus events to the subscriber set until stopped, then drains and joins it.
async fn listen(mut rx: broadcast::Receiver<Event>, set: SubscriberSet, stop: Token) {
    loop {
        tokio::select! {
            biased;
            ev = rx.recv() => match ev {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }
    while let Ok(ev) = rx.try_recv() {
        set.emit(&ev);
    }
    set.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn cfg() -> SupervisorConfig {
        SupervisorConfig {
            grace: Duration::from_secs(2),
            ..SupervisorConfig::default()
        }
    }

    fn cooperative(sup: &Supervisor, name: &'static str) -> TaskHandle {
        sup.spawn_fn(name, |t: Token| async move {
            t.cancelled().await;
            Ok(())
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn thousand_cooperative_tasks_stop_within_grace() {
        let sup = Supervisor::new(cfg());
        let handles: Vec<_> = (0..1000).map(|_| cooperative(&sup, "worker")).collect();

        let started = std::time::Instant::now();
        sup.shutdown(Duration::from_secs(2)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert!(handles.iter().all(|h| h.state() == TaskState::Cancelled));
        assert!(sup.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn token_ignoring_task_is_reported_by_id() {
        let sup = Supervisor::new(cfg());
        let good = cooperative(&sup, "good");
        let bad = sup
            .spawn_fn("stubborn", |_t: Token| async move {
                time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .unwrap();

        let err = sup.shutdown(Duration::from_millis(100)).await.unwrap_err();
        let stuck = err.stuck();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].id, bad.id());
        assert_eq!(&*stuck[0].name, "stubborn");

        assert_eq!(good.wait().await, TaskState::Cancelled);
        assert_eq!(bad.wait().await, TaskState::Aborted);
    }

    #[tokio::test]
    async fn unbounded_grace_waits_for_cooperative_tasks() {
        let sup = Supervisor::new(SupervisorConfig {
            grace: Duration::MAX,
            ..cfg()
        });
        let h = cooperative(&sup, "patient");

        sup.shutdown_default().await.unwrap();
        assert_eq!(h.state(), TaskState::Cancelled);
        assert!(sup.is_empty());
    }

    #[tokio::test]
    async fn runner_finishing_past_deadline_is_not_leaked() {
        let sup = Supervisor::new(cfg());
        let mut rx = sup.subscribe();

        let finished = TaskRecord::new(TaskId::new(7), Arc::from("late"), Token::new());
        finished.state.set(TaskState::Running);
        finished.state.set(TaskState::Completed);
        assert_eq!(sup.report_leak(&finished), None);
        assert_eq!(finished.state.get(), TaskState::Completed);
        assert!(rx.try_recv().is_err());

        let hung = TaskRecord::new(TaskId::new(8), Arc::from("hung"), Token::new());
        hung.state.set(TaskState::Running);
        let stuck = sup.report_leak(&hung).unwrap();
        assert_eq!(stuck.id, hung.id);
        assert_eq!(hung.state.get(), TaskState::Aborted);
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::TaskLeaked);
    }

    #[tokio::test]
    async fn spawn_accepts_owned_names() {
        let sup = Supervisor::new(cfg());
        let handles: Vec<_> = (0..3)
            .map(|i| {
                sup.spawn_fn(format!("shard-{i}"), |_t: Token| async { Ok(()) })
                    .unwrap()
            })
            .collect();
        let ticker = sup
            .spawn_periodic(String::from("poller"), Duration::from_millis(5), |_t: Token| async {
                Ok(())
            })
            .unwrap();

        assert_eq!(handles[2].name(), "shard-2");
        assert_eq!(ticker.name(), "poller");
        sup.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn spawn_after_shutdown_is_refused() {
        let sup = Supervisor::new(cfg());
        sup.shutdown(Duration::from_millis(10)).await.unwrap();
        assert!(sup.is_shutting_down());

        let res = sup.spawn_fn("late", |_t: Token| async { Ok(()) });
        assert!(matches!(res, Err(RuntimeError::ShuttingDown)));
    }

    #[tokio::test]
    async fn second_shutdown_is_noop() {
        let sup = Supervisor::new(cfg());
        let mut rx = sup.subscribe();
        sup.shutdown(Duration::from_millis(10)).await.unwrap();
        sup.shutdown(Duration::from_millis(10)).await.unwrap();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::ShutdownRequested, EventKind::AllStoppedWithin]
        );
    }

    #[tokio::test]
    async fn finished_tasks_leave_the_registry() {
        let sup = Supervisor::new(cfg());
        let h = sup.spawn_fn("quick", |_t: Token| async { Ok(()) }).unwrap();
        assert_eq!(h.wait().await, TaskState::Completed);

        for _ in 0..10 {
            if sup.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(sup.running().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_limit_holds_extra_tasks_in_created() {
        let sup = Supervisor::new(SupervisorConfig {
            max_concurrent: 2,
            ..cfg()
        });
        let handles: Vec<_> = (0..5).map(|_| cooperative(&sup, "limited")).collect();
        time::sleep(Duration::from_millis(10)).await;

        let running = handles
            .iter()
            .filter(|h| h.state() == TaskState::Running)
            .count();
        let queued = handles
            .iter()
            .filter(|h| h.state() == TaskState::Created)
            .count();
        assert_eq!((running, queued), (2, 3));

        sup.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(handles.iter().all(|h| h.state() == TaskState::Cancelled));
    }

    #[tokio::test]
    async fn spawn_with_cancelled_parent_ends_cancelled() {
        let sup = Supervisor::new(cfg());
        let parent = sup.token();
        parent.cancel();

        let h = sup
            .spawn_with_token(
                &parent,
                TaskSpec::new(
                    TaskFn::arc("orphan", |t: Token| async move {
                        t.cancelled().await;
                        Ok(())
                    }),
                    None,
                ),
            )
            .unwrap();
        assert_eq!(h.wait().await, TaskState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_ticks_until_shutdown() {
        let sup = Supervisor::new(cfg());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = {
            let hits = Arc::clone(&hits);
            sup.spawn_periodic("tick", Duration::from_millis(100), move |_t: Token| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap()
        };

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        sup.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(h.state(), TaskState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn owned_cache_is_swept_and_stopped() {
        let sup = Supervisor::new(cfg());
        let cache: BoundedCache<u32, u32> = sup
            .cache(
                "sessions",
                CacheConfig::new(Duration::from_millis(100), Duration::from_millis(50)),
            )
            .unwrap();
        assert_eq!(sup.len(), 1);

        for i in 0..100 {
            cache.set(i, i);
        }
        time::sleep(Duration::from_millis(160)).await;
        assert_eq!(cache.len(), 0);

        sup.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(sup.is_empty());
    }

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _e: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    #[tokio::test]
    async fn subscribers_are_drained_at_shutdown() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sup = Supervisor::builder(cfg())
            .with_subscribers(vec![Arc::new(Counter(Arc::clone(&seen))) as _])
            .build();

        let h = sup.spawn_fn("one", |_t: Token| async { Ok(()) }).unwrap();
        h.wait().await;
        sup.shutdown(Duration::from_secs(1)).await.unwrap();

        // spawned, starting, completed, shutdown requested, all stopped
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
