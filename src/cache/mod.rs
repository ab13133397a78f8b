//! # TTL-bounded caching.
//!
//! - [`BoundedCache`] key/value store with TTL expiry and an owned sweeper
//! - [`CacheConfig`] TTL, sweep interval, optional capacity
//! - [`CacheStats`] counters snapshot

mod bounded;
mod config;

pub(crate) use bounded::sweep_loop;
pub use bounded::{BoundedCache, CacheStats};
pub use config::CacheConfig;
