//! # Periodic ticker bound to a cancellation token.
//!
//! ```text
//! loop {
//!   select! {
//!     token.cancelled() ─► stop() ─► None   (timer entry dropped)
//!     interval.tick()   ─► Some(instant)
//!   }
//! }
//! ```
//!
//! ## Rules
//! - The first tick fires one `period` after construction (never immediately).
//! - Missed ticks are delayed, not bursted.
//! - Once [`Ticker::tick`] returned `None` it keeps returning `None`.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::cancel::Token;
use crate::timers::instant_after;

/// Periodic timer that stops itself when its token fires.
///
/// Must be created inside a tokio runtime.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use lifeline::{Ticker, Token};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = Token::with_timeout(Duration::from_millis(35));
/// let mut ticker = Ticker::new(Duration::from_millis(10), token);
/// let mut ticks = 0;
/// while ticker.tick().await.is_some() {
///     ticks += 1;
/// }
/// assert!(ticker.is_stopped());
/// assert!(ticks >= 1);
/// # }
/// ```
#[derive(Debug)]
pub struct Ticker {
    interval: Option<Interval>,
    period: Duration,
    token: Token,
}

impl Ticker {
    /// Creates a ticker with the given period (clamped to at least 1ms).
    pub fn new(period: Duration, token: Token) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = time::interval_at(instant_after(period), period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
            period,
            token,
        }
    }

    /// Waits for the next tick.
    ///
    /// Returns `None` once the token fired or the ticker was stopped.
    pub async fn tick(&mut self) -> Option<Instant> {
        if self.token.is_cancelled() {
            self.stop();
        }
        let interval = self.interval.as_mut()?;

        let next = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            at = interval.tick() => Some(at),
        };
        if next.is_none() {
            self.stop();
        }
        next
    }

    /// Stops the ticker and releases its timer entry.
    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Returns `true` once the ticker will never tick again.
    pub fn is_stopped(&self) -> bool {
        self.interval.is_none()
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}
