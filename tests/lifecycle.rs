//! End-to-end lifecycle scenarios through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use lifeline::{
    BoundedCache, CacheConfig, CancelReason, EventKind, RuntimeError, Supervisor,
    SupervisorConfig, TaskError, TaskState, Ticker, Token, for_each_scoped,
};

fn sup_cfg() -> SupervisorConfig {
    SupervisorConfig {
        grace: Duration::from_secs(2),
        ..SupervisorConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_reaches_every_waiter() {
    let token = Token::new();
    let woke = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..100)
        .map(|_| {
            let token = token.clone();
            let woke = Arc::clone(&woke);
            tokio::spawn(async move {
                token.cancelled().await;
                woke.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    token.cancel();
    token.cancel();
    for w in waiters {
        tokio::time::timeout(Duration::from_secs(1), w)
            .await
            .expect("waiter did not wake")
            .unwrap();
    }
    assert_eq!(woke.load(Ordering::SeqCst), 100);
    assert_eq!(token.reason(), Some(CancelReason::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn deadline_fires_without_explicit_cancel() {
    let token = Token::with_timeout(Duration::from_millis(50));
    let child = token.child_token();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(token.is_cancelled());
    assert!(child.is_cancelled());
    assert_eq!(token.reason(), Some(CancelReason::DeadlineExceeded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn thousand_tasks_stop_within_two_seconds() {
    let sup = Supervisor::new(sup_cfg());
    let mut handles = Vec::with_capacity(1000);
    for _ in 0..1000 {
        handles.push(
            sup.spawn_fn("worker", |ctx: Token| async move {
                let mut ticker = Ticker::new(Duration::from_millis(5), ctx);
                while ticker.tick().await.is_some() {}
                Ok(())
            })
            .unwrap(),
        );
    }
    assert_eq!(sup.len(), 1000);

    sup.shutdown(Duration::from_secs(2)).await.unwrap();
    for h in &handles {
        assert!(h.state().is_terminal(), "{} not terminal", h.id());
    }
    assert!(sup.is_empty());
}

#[tokio::test(start_paused = true)]
async fn token_ignoring_task_is_named_in_the_leak_report() {
    let sup = Supervisor::new(sup_cfg());
    let mut rx = sup.subscribe();

    for _ in 0..5 {
        sup.spawn_fn("polite", |ctx: Token| async move {
            ctx.cancelled().await;
            Ok(())
        })
        .unwrap();
    }
    let rude = sup
        .spawn_fn("rude", |_ctx: Token| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), TaskError>(())
        })
        .unwrap();

    let err = sup.shutdown(Duration::from_millis(200)).await.unwrap_err();
    match &err {
        RuntimeError::GraceExceeded { grace, stuck } => {
            assert_eq!(*grace, Duration::from_millis(200));
            let ids: Vec<_> = stuck.iter().map(|s| s.id).collect();
            assert_eq!(ids, vec![rude.id()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.as_label(), "runtime_grace_exceeded");

    let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert!(kinds.contains(&EventKind::TaskLeaked));
    assert_eq!(kinds.last(), Some(&EventKind::GraceExceeded));
    assert!(!kinds.contains(&EventKind::AllStoppedWithin));
}

#[tokio::test]
async fn spawning_after_shutdown_fails() {
    let sup = Supervisor::new(sup_cfg());
    sup.shutdown(Duration::from_millis(50)).await.unwrap();

    let res = sup.spawn_fn("late", |_ctx: Token| async { Ok(()) });
    assert!(matches!(res, Err(RuntimeError::ShuttingDown)));
    let res = sup.cache::<u32, u32>("late", CacheConfig::default());
    assert!(matches!(res, Err(RuntimeError::ShuttingDown)));
}

#[tokio::test(start_paused = true)]
async fn task_with_expired_deadline_ends_cancelled() {
    let sup = Supervisor::new(sup_cfg());
    let token = sup.token_with_timeout(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let h = sup
        .spawn_with_token(
            &token,
            lifeline::TaskSpec::new(
                lifeline::TaskFn::arc("expired", |ctx: Token| async move {
                    ctx.cancelled().await;
                    Ok(())
                }),
                None,
            ),
        )
        .unwrap();
    assert_eq!(h.wait().await, TaskState::Cancelled);
    assert_eq!(h.token().reason(), Some(CancelReason::DeadlineExceeded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_thousand_entries_are_swept_to_zero() {
    let sup = Supervisor::new(sup_cfg());
    let cache: BoundedCache<u64, Vec<u8>> = sup
        .cache(
            "bulk",
            CacheConfig::new(Duration::from_millis(100), Duration::from_millis(50)),
        )
        .unwrap();

    for i in 0..10_000u64 {
        cache.set(i, vec![0u8; 16]);
    }
    assert_eq!(cache.len(), 10_000);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.get(&1), None);
    assert_eq!(cache.stats().evicted, 10_000);

    sup.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cache_get_never_returns_stale_values() {
    let cache: BoundedCache<&'static str, u32> =
        BoundedCache::new(CacheConfig::new(Duration::from_millis(100), Duration::ZERO));
    cache.set("k", 7);

    tokio::time::sleep(Duration::from_millis(99)).await;
    assert_eq!(cache.get("k"), Some(7));
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(cache.get("k"), None);
}

#[test]
fn scoped_loop_writes_every_line_with_one_handle_open() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.txt");
    let open_now = AtomicUsize::new(0);

    let written = for_each_scoped(
        0..1000,
        |_| {
            open_now.fetch_add(1, Ordering::SeqCst);
            std::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
        },
        |file| {
            drop(file);
            open_now.fetch_sub(1, Ordering::SeqCst);
        },
        |i, file| {
            assert_eq!(open_now.load(Ordering::SeqCst), 1);
            writeln!(file, "Line {i}")
        },
    )
    .unwrap();

    assert_eq!(written, 1000);
    assert_eq!(open_now.load(Ordering::SeqCst), 0);
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1000);
}
