//! # Cancellable timers owned by exactly one component.
//!
//! - [`Ticker`] periodic ticks until its [`Token`](crate::Token) fires or it is stopped
//! - [`Timer`] one-shot timer that races the token
//!
//! Both release their underlying tokio timer entry on [`stop`](Ticker::stop), on
//! cancellation, and on drop. Owners never need a separate cleanup step.

mod ticker;
mod timer;

pub use ticker::Ticker;
pub use timer::{Timer, TimerOutcome};

use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::deadline_after;

/// Stand-in for durations whose deadline does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + after`, clamped to a far-future instant on overflow.
pub(crate) fn instant_after(after: Duration) -> Instant {
    deadline_after(after).unwrap_or_else(|| Instant::now() + FAR_FUTURE)
}
