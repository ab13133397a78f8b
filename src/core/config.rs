//! # Supervisor configuration.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no semaphore created)
//! - `timeout = 0s` → no per-run timeout (treated as `None` by `TaskSpec::with_defaults`)

use std::time::Duration;

/// Global configuration for a [`Supervisor`](crate::Supervisor).
///
/// ## Field semantics
/// - `grace`: default wait for tasks to stop during shutdown
/// - `max_concurrent`: cap on concurrently running work (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `timeout`: default per-run timeout (`0s` = none)
///
/// All fields are public; prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum time [`Supervisor::shutdown_default`](crate::Supervisor::shutdown_default)
    /// waits before reporting leaked tasks.
    pub grace: Duration,

    /// Maximum number of tasks running at once.
    ///
    /// Tasks beyond the limit stay `Created` until a permit frees up or their token fires.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Default per-run timeout.
    pub timeout: Duration,
}

impl SupervisorConfig {
    /// Returns the concurrency limit, `None` when unlimited.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the default per-run timeout, `None` when disabled.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// - `grace = 30s`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no timeout)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            max_concurrent: 0,
            bus_capacity: 1024,
            timeout: Duration::ZERO,
        }
    }
}
