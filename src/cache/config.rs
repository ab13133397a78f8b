//! # Cache configuration.
//!
//! ## Sentinel values
//! - `max_entries = 0` → no hard capacity, memory bounded by `ttl` × insertion rate
//! - `sweep_interval = 0s` → sweep once per `ttl`

use std::time::Duration;

/// Settings for a [`BoundedCache`](crate::BoundedCache).
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Maximum age of an entry before it is invisible to `get` and eligible for sweeping.
    pub ttl: Duration,
    /// Period of the background sweeper.
    pub sweep_interval: Duration,
    /// Hard cap on stored entries (`0` = unbounded).
    pub max_entries: usize,
}

impl CacheConfig {
    /// Shorthand for a config with the given TTL and sweep interval.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            ttl,
            sweep_interval,
            max_entries: 0,
        }
    }

    /// Returns a copy with a hard capacity.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Returns the capacity limit, `None` when unbounded.
    #[inline]
    pub fn capacity_limit(&self) -> Option<usize> {
        if self.max_entries == 0 {
            None
        } else {
            Some(self.max_entries)
        }
    }

    /// Returns the sweep period (`ttl` when unset), never below 1ms.
    #[inline]
    pub fn sweep_interval_clamped(&self) -> Duration {
        let period = if self.sweep_interval == Duration::ZERO {
            self.ttl
        } else {
            self.sweep_interval
        };
        period.max(Duration::from_millis(1))
    }
}

impl Default for CacheConfig {
    /// - `ttl = 60s`
    /// - `sweep_interval = 30s`
    /// - `max_entries = 0` (unbounded)
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            max_entries: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_falls_back_to_ttl() {
        let cfg = CacheConfig::new(Duration::from_secs(5), Duration::ZERO);
        assert_eq!(cfg.sweep_interval_clamped(), Duration::from_secs(5));

        let cfg = CacheConfig::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(cfg.sweep_interval_clamped(), Duration::from_millis(1));
    }

    #[test]
    fn capacity_sentinel() {
        assert_eq!(CacheConfig::default().capacity_limit(), None);
        assert_eq!(
            CacheConfig::default().with_max_entries(8).capacity_limit(),
            Some(8)
        );
    }
}
