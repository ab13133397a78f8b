//! # One-shot timer that races a cancellation token.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Sleep};

use crate::cancel::Token;
use crate::timers::instant_after;

/// How a [`Timer::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The timer elapsed.
    Fired,
    /// The token fired first; the timer was released.
    Cancelled,
    /// The timer had already fired or was stopped.
    Stopped,
}

/// One-shot timer bound to a token.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct Timer {
    sleep: Option<Pin<Box<Sleep>>>,
    token: Token,
}

impl Timer {
    /// Arms a timer that fires `after` from now.
    pub fn new(after: Duration, token: Token) -> Self {
        Self {
            sleep: Some(Box::pin(time::sleep_until(instant_after(after)))),
            token,
        }
    }

    /// Waits for the timer or the token, whichever comes first.
    pub async fn wait(&mut self) -> TimerOutcome {
        let Some(sleep) = self.sleep.as_mut() else {
            return TimerOutcome::Stopped;
        };

        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => TimerOutcome::Cancelled,
            _ = sleep.as_mut() => TimerOutcome::Fired,
        };
        self.sleep = None;
        outcome
    }

    /// Disarms the timer.
    ///
    /// Returns `true` if the timer was still pending.
    pub fn stop(&mut self) -> bool {
        match self.sleep.take() {
            Some(sleep) => !sleep.is_elapsed(),
            None => false,
        }
    }

    /// Re-arms the timer to fire `after` from now.
    pub fn reset(&mut self, after: Duration) {
        let deadline = instant_after(after);
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(deadline),
            None => self.sleep = Some(Box::pin(time::sleep_until(deadline))),
        }
    }

    /// Returns `true` while the timer is armed.
    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once() {
        let mut timer = Timer::new(Duration::from_millis(20), Token::new());
        assert_eq!(timer.wait().await, TimerOutcome::Fired);
        assert!(!timer.is_armed());
        assert_eq!(timer.wait().await, TimerOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_fire() {
        let token = Token::new();
        let mut timer = Timer::new(Duration::from_secs(3600), token.clone());

        let waiter = tokio::spawn(async move { timer.wait().await });
        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();

        assert_eq!(waiter.await.unwrap(), TimerOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn huge_delay_is_clamped_not_overflowed() {
        let mut timer = Timer::new(Duration::MAX, Token::with_timeout(Duration::from_millis(10)));
        assert_eq!(timer.wait().await, TimerOutcome::Cancelled);

        timer.reset(Duration::MAX);
        assert!(timer.is_armed());
        assert!(timer.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_reports_pending() {
        let mut timer = Timer::new(Duration::from_secs(1), Token::new());
        assert!(timer.stop());
        assert!(!timer.stop());
        assert_eq!(timer.wait().await, TimerOutcome::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_rearms_stopped_timer() {
        let mut timer = Timer::new(Duration::from_secs(1), Token::new());
        timer.stop();
        timer.reset(Duration::from_millis(10));
        assert!(timer.is_armed());
        assert_eq!(timer.wait().await, TimerOutcome::Fired);
    }
}
