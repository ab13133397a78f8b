//! # TTL-bounded cache with an owned sweeper.
//!
//! ## Architecture
//! ```text
//! BoundedCache (Arc<Inner>) ──clone──► callers: set / get / remove
//!        │
//!        └─ Weak<Inner> ──► sweeper task: Ticker(sweep_interval, token)
//!                               └─ each tick: upgrade → sweep() → publish CacheSwept
//!                               └─ exits when token fires OR last cache handle dropped
//! ```
//!
//! ## Rules
//! - All access goes through the cache's `RwLock`: `get` takes the read lock,
//!   `set`/`remove`/`sweep` the write lock, and no lock is held across a tick.
//! - `get` never returns an entry older than `ttl`, even before a sweep removed it.
//! - A sweep is one O(n) `retain` pass; after it, no entry older than `ttl` remains.
//! - With `max_entries`, inserting a new key into a full cache drops expired entries
//!   first and then the oldest entry. Both sit at the front of the insertion order,
//!   so eviction pops from a queue instead of scanning the map.

use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::cache::CacheConfig;
use crate::cancel::Token;
use crate::events::{Bus, Event, EventKind};
use crate::timers::Ticker;

/// Queue entries beyond `2 * len + ORDER_SLACK` trigger a compaction.
const ORDER_SLACK: usize = 64;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

/// Map plus its insertion order; `order` is kept only for capacity-limited caches.
///
/// `order` may hold stale `(seq, key)` pairs for keys that were overwritten or
/// removed; a pair is live only while the map entry carries the same `seq`.
struct Store<K, V> {
    map: HashMap<K, Entry<V>>,
    order: VecDeque<(u64, K)>,
    next_seq: u64,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash,
{
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
        }
    }

    fn is_live(&self, seq: u64, key: &K) -> bool {
        self.map.get(key).is_some_and(|e| e.seq == seq)
    }

    fn compact_order(&mut self) {
        let map = &self.map;
        self.order
            .retain(|(seq, key)| map.get(key).is_some_and(|e| e.seq == *seq));
    }

    /// Frees one slot: every expired entry if there are any, else the oldest one.
    ///
    /// Returns how many entries were dropped.
    fn evict_front(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut removed = 0;
        while let Some((seq, key)) = self.order.pop_front() {
            if !self.is_live(seq, &key) {
                continue;
            }
            let expired = self
                .map
                .get(&key)
                .is_some_and(|e| now.saturating_duration_since(e.inserted_at) >= ttl);
            if removed > 0 && !expired {
                self.order.push_front((seq, key));
                break;
            }
            self.map.remove(&key);
            removed += 1;
            if !expired {
                break;
            }
        }
        removed
    }
}

pub(crate) struct Inner<K, V> {
    name: Arc<str>,
    cfg: CacheConfig,
    entries: RwLock<Store<K, V>>,
    bus: Option<Bus>,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored entries, including expired ones not swept yet.
    pub size: usize,
    /// `get` calls that returned a value.
    pub hits: u64,
    /// `get` calls that found nothing or an expired entry.
    pub misses: u64,
    /// Entries removed by sweeps or capacity eviction.
    pub evicted: u64,
}

/// Key/value store whose memory is bounded by TTL, not by program lifetime.
///
/// Cloning shares the same storage.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use lifeline::{BoundedCache, CacheConfig};
///
/// let cache: BoundedCache<String, u32> =
///     BoundedCache::new(CacheConfig::new(Duration::from_secs(60), Duration::from_secs(10)));
/// cache.set("answer".to_string(), 42);
/// assert_eq!(cache.get("answer"), Some(42));
/// assert_eq!(cache.remove("answer"), Some(42));
/// assert!(cache.is_empty());
/// ```
pub struct BoundedCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for BoundedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty cache without a sweeper.
    pub fn new(cfg: CacheConfig) -> Self {
        Self::build("cache", cfg, None)
    }

    /// Creates an empty named cache; the name appears in `CacheSwept` events.
    pub fn named(name: impl Into<Arc<str>>, cfg: CacheConfig) -> Self {
        Self::build(name, cfg, None)
    }

    pub(crate) fn build(name: impl Into<Arc<str>>, cfg: CacheConfig, bus: Option<Bus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                cfg,
                entries: RwLock::new(Store::new()),
                bus,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evicted: AtomicU64::new(0),
            }),
        }
    }

    /// Cache name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.cfg
    }

    /// Inserts or overwrites `key` with a fresh timestamp.
    pub fn set(&self, key: K, value: V)
    where
        K: Clone,
    {
        let now = Instant::now();
        let mut store = self.inner.entries.write();
        let seq = store.next_seq;
        store.next_seq += 1;

        let limited = match self.inner.cfg.capacity_limit() {
            Some(limit) => {
                if store.map.len() >= limit && !store.map.contains_key(&key) {
                    let removed = store.evict_front(now, self.inner.cfg.ttl);
                    self.inner.evicted.fetch_add(removed as u64, Ordering::Relaxed);
                    trace!(cache = %self.inner.name, removed, "capacity reached");
                }
                store.order.push_back((seq, key.clone()));
                true
            }
            None => false,
        };

        store.map.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                seq,
            },
        );
        if limited && store.order.len() > 2 * store.map.len() + ORDER_SLACK {
            store.compact_order();
        }
    }

    /// Removes `key`, returning its value if it had not expired.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.inner.entries.write().map.remove(key)?;
        if self.inner.is_expired(&entry, Instant::now()) {
            None
        } else {
            Some(entry.value)
        }
    }

    /// Returns `true` if `key` holds an unexpired value.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.inner
            .entries
            .read()
            .map
            .get(key)
            .is_some_and(|e| !self.inner.is_expired(e, now))
    }

    /// Number of stored entries, including expired ones not swept yet.
    pub fn len(&self) -> usize {
        self.inner.entries.read().map.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().map.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut store = self.inner.entries.write();
        store.map.clear();
        store.order.clear();
    }

    /// Removes every entry older than `ttl` in one pass and returns how many went.
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evicted: self.inner.evicted.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns a clone of the value, or `None` if absent or expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let found = {
            let store = self.inner.entries.read();
            store
                .map
                .get(key)
                .filter(|e| !self.inner.is_expired(e, now))
                .map(|e| e.value.clone())
        };

        let counter = if found.is_some() {
            &self.inner.hits
        } else {
            &self.inner.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Spawns the background sweeper.
    ///
    /// The sweeper stops when `token` fires or when the last cache handle is dropped.
    /// Must be called inside a tokio runtime.
    pub fn spawn_sweeper(&self, token: Token) -> JoinHandle<()> {
        tokio::spawn(sweep_loop(self.downgrade(), token))
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner<K, V>> {
        Arc::downgrade(&self.inner)
    }
}

/// Sweeps on every tick until the token fires or the cache is gone.
pub(crate) async fn sweep_loop<K, V>(inner: Weak<Inner<K, V>>, token: Token)
where
    K: Eq + Hash,
{
    let Some(period) = inner.upgrade().map(|i| i.cfg.sweep_interval_clamped()) else {
        return;
    };
    let mut ticker = Ticker::new(period, token);

    while ticker.tick().await.is_some() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.sweep();
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash,
{
    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.cfg.ttl
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let ttl = self.cfg.ttl;
        let removed = {
            let mut store = self.entries.write();
            let before = store.map.len();
            store
                .map
                .retain(|_, e| now.saturating_duration_since(e.inserted_at) < ttl);
            if !store.order.is_empty() {
                store.compact_order();
            }
            before - store.map.len()
        };
        self.evicted.fetch_add(removed as u64, Ordering::Relaxed);

        if removed > 0 {
            trace!(cache = %self.name, removed, "swept");
            if let Some(bus) = &self.bus {
                bus.publish(
                    Event::new(EventKind::CacheSwept)
                        .with_task(Arc::clone(&self.name))
                        .with_count(removed as u64),
                );
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(ttl_ms: u64, sweep_ms: u64) -> CacheConfig {
        CacheConfig::new(Duration::from_millis(ttl_ms), Duration::from_millis(sweep_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_invisible_before_sweep() {
        let cache = BoundedCache::new(cfg(100, 1000));
        cache.set("k", 1);
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get("k"), None);
        assert!(!cache.contains_key("k"));
        // still stored until swept
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.sweep(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn set_refreshes_timestamp() {
        let cache = BoundedCache::new(cfg(100, 1000));
        cache.set("k", 1);
        tokio::time::advance(Duration::from_millis(80)).await;
        cache.set("k", 2);
        tokio::time::advance(Duration::from_millis(80)).await;

        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries() {
        let cache = BoundedCache::new(cfg(100, 50));
        let token = Token::new();
        let sweeper = cache.spawn_sweeper(token.clone());

        for i in 0..100 {
            cache.set(i, i);
        }
        tokio::time::sleep(Duration::from_millis(160)).await;
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().evicted, 100);

        token.cancel();
        sweeper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_exits_when_cache_dropped() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new(cfg(100, 10));
        let sweeper = cache.spawn_sweeper(Token::new());
        drop(cache);

        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweeper must stop once the cache is gone")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest() {
        let cache = BoundedCache::new(cfg(10_000, 1000).with_max_entries(2));
        cache.set("a", 1);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("b", 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));

        // overwriting an existing key never evicts
        cache.set("b", 20);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_prefers_expired_entries() {
        let cache = BoundedCache::new(cfg(50, 1000).with_max_entries(2));
        cache.set("old", 1);
        tokio::time::advance(Duration::from_millis(60)).await;
        cache.set("fresh", 2);
        cache.set("newest", 3);

        assert_eq!(cache.get("fresh"), Some(2));
        assert_eq!(cache.get("newest"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_eviction_skips_overwritten_and_removed_keys() {
        let cache = BoundedCache::new(cfg(10_000, 1000).with_max_entries(3));
        cache.set("a", 1);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("b", 2);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("c", 3);
        tokio::time::advance(Duration::from_millis(1)).await;
        cache.set("a", 10);
        assert_eq!(cache.remove("b"), Some(2));

        cache.set("d", 4);
        cache.set("e", 5);

        assert_eq!(cache.get("c"), None);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("d"), Some(4));
        assert_eq!(cache.get("e"), Some(5));
        assert_eq!(cache.stats().evicted, 1);
    }

    #[test]
    fn overwrites_keep_order_queue_bounded() {
        let cache = BoundedCache::new(cfg(60_000, 1000).with_max_entries(10));
        for i in 0..10_000u32 {
            cache.set(i % 5, i);
        }
        assert_eq!(cache.len(), 5);
        assert!(cache.inner.entries.read().order.len() <= 2 * 5 + ORDER_SLACK + 1);
        assert_eq!(cache.get(&4), Some(9_999));
    }

    #[test]
    fn stats_count_hits_and_misses() {
        let cache = BoundedCache::new(cfg(60_000, 1000));
        cache.set("k".to_string(), 1);
        cache.get("k");
        cache.get("k");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_readers_and_sweeps() {
        let cache: BoundedCache<u64, u64> = BoundedCache::new(cfg(60_000, 1));
        let token = Token::new();
        let sweeper = cache.spawn_sweeper(token.clone());

        let mut set = tokio::task::JoinSet::new();
        for w in 0..8u64 {
            let c = cache.clone();
            set.spawn(async move {
                for round in 0..50u64 {
                    for k in 0..100u64 {
                        c.set(w * 1000 + k, round);
                        let _ = c.get(&(w * 1000 + k));
                    }
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap();
        }
        token.cancel();
        sweeper.await.unwrap();

        assert_eq!(cache.len(), 800);
        for w in 0..8u64 {
            for k in 0..100u64 {
                assert_eq!(cache.get(&(w * 1000 + k)), Some(49));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_writes_survive_concurrent_expiring_sweeps() {
        let cache: BoundedCache<u64, u64> = BoundedCache::new(cfg(150, 1));
        let token = Token::new();
        let sweeper = cache.spawn_sweeper(token.clone());

        let mut set = tokio::task::JoinSet::new();
        for w in 0..8u64 {
            let c = cache.clone();
            set.spawn(async move {
                let last = w * 1_000_000 + 999_999;
                for round in 0..40u64 {
                    for k in 0..50u64 {
                        let key = w * 1_000_000 + round * 100 + k;
                        c.set(key, round);
                        let _ = c.get(&key);
                    }
                    c.set(last, round);
                    assert_eq!(c.get(&last), Some(round));
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });
        }
        while let Some(res) = set.join_next().await {
            res.unwrap();
        }
        token.cancel();
        sweeper.await.unwrap();

        cache.sweep();
        assert!(cache.stats().evicted > 0);
        assert!(cache.len() < 8 * 40 * 50);
        for w in 0..8u64 {
            assert_eq!(cache.get(&(w * 1_000_000 + 999_999)), Some(39));
        }
    }
}
