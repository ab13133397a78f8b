//! # Example: ttl_cache
//!
//! Fills a supervised cache and watches its sweeper bring the size back to zero.
//!
//! ## Flow
//! ```text
//! Supervisor::cache("sessions", ttl=200ms, sweep=100ms)
//!     ├─► spawn sweeper task (Ticker bound to the supervisor's token)
//!     ├─► set() × 10_000
//!     ├─► every 100ms: sweep() ─► publish(CacheSwept { count })
//!     └─► shutdown() ─► sweeper Cancelled
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example ttl_cache
//! ```

use std::time::Duration;

use lifeline::{BoundedCache, CacheConfig, EventKind, Supervisor, SupervisorConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sup = Supervisor::new(SupervisorConfig::default());
    let mut events = sup.subscribe();

    let cache: BoundedCache<u64, String> = sup.cache(
        "sessions",
        CacheConfig::new(Duration::from_millis(200), Duration::from_millis(100)),
    )?;

    for id in 0..10_000u64 {
        cache.set(id, format!("session-{id}"));
    }
    println!("[main] inserted: {:?}", cache.stats());
    println!("[main] get(42) = {:?}", cache.get(&42));

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        println!("[main] size = {}", cache.len());
    }

    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::CacheSwept {
            println!(
                "[event] {} swept {} entries",
                ev.task.as_deref().unwrap_or("<cache>"),
                ev.count.unwrap_or(0)
            );
        }
    }

    println!("[main] final: {:?}", cache.stats());
    sup.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}
