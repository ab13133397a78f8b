//! # Cancellation token with an optional intrinsic deadline.
//!
//! [`Token`] wraps [`tokio_util::sync::CancellationToken`] and folds "timeout" into the
//! same signal path as "cancel": a token created with a deadline behaves exactly like
//! one that somebody cancels at that instant.
//!
//! ## Architecture
//! ```text
//! root Token ──child_token()──► task Token ──child_token()──► run Token
//!     │                             │                              │
//!     └── cancel() ─────────────────┴──────────────────────────────┘  (propagates down only)
//!
//! deadline: child deadline = min(parent deadline, own deadline)
//! ```
//!
//! ## Rules
//! - Cancellation is **irreversible** and **idempotent**; `cancel()` never fails.
//! - Cancelling a child never affects its parent.
//! - Deadlines are observed lazily: no timer exists unless someone awaits
//!   [`Token::cancelled`], and that timer is dropped with the awaiting future.
//! - [`Token::cancelled`] is a single-fire signal; any number of waiters may await it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const REASON_NONE: u8 = 0;
const REASON_CANCELLED: u8 = 1;
const REASON_DEADLINE: u8 = 2;

/// Why a [`Token`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Someone called [`Token::cancel`] on this token or an ancestor.
    Cancelled,
    /// The token's deadline (own or inherited) passed.
    DeadlineExceeded,
}

/// Cloneable cancellation signal.
///
/// Clones share state: cancelling any clone cancels all of them.
///
/// # Example
/// ```
/// use lifeline::{CancelReason, Token};
///
/// let token = Token::new();
/// let child = token.child_token();
/// assert!(!child.is_cancelled());
///
/// token.cancel();
/// token.cancel(); // no-op
/// assert!(child.is_cancelled());
/// assert_eq!(token.reason(), Some(CancelReason::Cancelled));
/// ```
#[derive(Clone, Debug)]
pub struct Token {
    inner: CancellationToken,
    deadline: Option<Instant>,
    reason: Arc<AtomicU8>,
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl Token {
    /// Creates an active token without a deadline.
    pub fn new() -> Self {
        Self::from_parts(CancellationToken::new(), None)
    }

    /// Creates a token that fires `timeout` from now.
    ///
    /// A timeout too large to represent yields a token without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::from_parts(CancellationToken::new(), deadline_after(timeout))
    }

    /// Creates a token that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::from_parts(CancellationToken::new(), Some(deadline))
    }

    fn from_parts(inner: CancellationToken, deadline: Option<Instant>) -> Self {
        Self {
            inner,
            deadline,
            reason: Arc::new(AtomicU8::new(REASON_NONE)),
        }
    }

    /// Derives a child that is cancelled together with `self` (but not vice versa).
    ///
    /// The child inherits the parent's deadline.
    pub fn child_token(&self) -> Token {
        Self::from_parts(self.inner.child_token(), self.deadline)
    }

    /// Derives a child with its own timeout; the earlier of both deadlines wins.
    pub fn child_with_timeout(&self, timeout: Duration) -> Token {
        let deadline = match (self.deadline, deadline_after(timeout)) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self::from_parts(self.inner.child_token(), deadline)
    }

    /// Cancels the token and all its descendants.
    ///
    /// Idempotent and safe to call concurrently from any number of callers.
    pub fn cancel(&self) {
        let _ = self.reason.compare_exchange(
            REASON_NONE,
            REASON_CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.inner.cancel();
    }

    /// Returns `true` once the token was cancelled or its deadline passed.
    ///
    /// Once `true`, stays `true` for every caller.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled() || self.latch_deadline()
    }

    /// Returns why the token fired, or `None` while it is still active.
    pub fn reason(&self) -> Option<CancelReason> {
        if !self.is_cancelled() {
            return None;
        }
        match self.reason.load(Ordering::Acquire) {
            REASON_DEADLINE => Some(CancelReason::DeadlineExceeded),
            REASON_CANCELLED => Some(CancelReason::Cancelled),
            _ if self.deadline_passed() => Some(CancelReason::DeadlineExceeded),
            _ => Some(CancelReason::Cancelled),
        }
    }

    /// Returns the deadline this token carries, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline (`None` without a deadline, zero once passed).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Resolves once the token is cancelled or its deadline passes.
    ///
    /// Cancel-safe; the deadline timer lives inside the returned future only.
    pub async fn cancelled(&self) {
        match self.deadline {
            None => self.inner.cancelled().await,
            Some(at) => {
                tokio::select! {
                    _ = self.inner.cancelled() => {}
                    _ = tokio::time::sleep_until(at) => {
                        self.latch_deadline();
                    }
                }
            }
        }
    }

    /// Races `fut` against this token.
    ///
    /// Returns `None` if the token fired first; `fut` is dropped in that case.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Returns a guard that cancels this token when dropped.
    pub fn drop_guard(self) -> TokenGuard {
        TokenGuard { token: Some(self) }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    fn latch_deadline(&self) -> bool {
        if !self.deadline_passed() {
            return false;
        }
        let _ = self.reason.compare_exchange(
            REASON_NONE,
            REASON_DEADLINE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.inner.cancel();
        true
    }
}

/// `now + timeout`, or `None` when that instant overflows.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Cancels the wrapped [`Token`] on drop unless disarmed.
#[derive(Debug)]
pub struct TokenGuard {
    token: Option<Token>,
}

impl TokenGuard {
    /// Returns the token without cancelling it.
    pub fn disarm(mut self) -> Token {
        // `token` is only taken here or in `drop`
        self.token.take().unwrap_or_default()
    }
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
