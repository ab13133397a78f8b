//! # Example: leak_report
//!
//! Shuts down a supervisor that owns one well-behaved worker and one that ignores
//! its token, and prints the leak report.
//!
//! Shows how to:
//! - Attach the built-in [`LogWriter`] and a custom [`Subscribe`] implementation.
//! - Spawn token-observing work with [`Supervisor::spawn_fn`].
//! - Read [`RuntimeError::GraceExceeded`] after a bounded shutdown.
//!
//! ## Flow
//! ```text
//! Supervisor::builder(cfg).with_subscribers([LogWriter, LeakAlarm]).build()
//!     ├─► spawn_fn("heartbeat")  observes its token
//!     ├─► spawn_fn("stubborn")   never looks at its token
//!     └─► shutdown(300ms)
//!           ├─► publish(ShutdownRequested), cancel every token
//!           ├─► heartbeat ─► Cancelled
//!           ├─► stubborn  ─► Aborted + publish(TaskLeaked) ──► LeakAlarm.on_event()
//!           └─► publish(GraceExceeded) ─► Err(GraceExceeded { stuck: [stubborn] })
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=lifeline=debug cargo run --example leak_report
//! ```

use std::{sync::Arc, time::Duration};

use lifeline::{
    Event, EventKind, LogWriter, RuntimeError, Subscribe, Supervisor, SupervisorConfig, TaskError,
    Ticker, Token,
};
use tracing_subscriber::EnvFilter;

/// Prints every leaked task as soon as the supervisor reports it.
struct LeakAlarm;

#[async_trait::async_trait]
impl Subscribe for LeakAlarm {
    async fn on_event(&self, ev: &Event) {
        if ev.kind == EventKind::TaskLeaked {
            println!(
                "[alarm] leaked: task={} id={}",
                ev.task.as_deref().unwrap_or("<unknown>"),
                ev.task_id.map(|id| id.to_string()).unwrap_or_default()
            );
        }
    }

    fn name(&self) -> &'static str {
        "leak-alarm"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new()), Arc::new(LeakAlarm)];
    let sup = Supervisor::builder(SupervisorConfig::default())
        .with_subscribers(subs)
        .build();

    sup.spawn_fn("heartbeat", |ctx: Token| async move {
        let mut ticker = Ticker::new(Duration::from_millis(100), ctx);
        while ticker.tick().await.is_some() {
            println!("[heartbeat] tick");
        }
        println!("[heartbeat] token fired, exiting");
        Ok(())
    })?;

    sup.spawn_fn("stubborn", |_ctx: Token| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok::<(), TaskError>(())
    })?;

    tokio::time::sleep(Duration::from_millis(350)).await;

    match sup.shutdown(Duration::from_millis(300)).await {
        Ok(()) => println!("[main] all tasks stopped within grace"),
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            println!("[main] grace {grace:?} exceeded, {} leaked:", stuck.len());
            for task in stuck {
                println!(
                    "  {} {:<10} running for {:?}",
                    task.id, task.name, task.running_for
                );
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
