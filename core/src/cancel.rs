//! Per-request cancellation.
//!
//! # Design
//! Transports receive a [`CancellationToken`] and the request deadline, if
//! any. `TimeoutGuard` arms a timer thread that cancels the token once the
//! timeout passes. Dropping the guard closes its disarm channel and joins the
//! thread, so a cancellation can never land after the action that owned the
//! guard has returned.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use tokio_util::sync::CancellationToken;

/// Time left until `deadline`, or `None` when there is no deadline.
pub fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
}

/// Timer that cancels a token after a fixed duration unless dropped first.
#[derive(Debug)]
pub struct TimeoutGuard {
    disarm: Option<Sender<()>>,
    timer: Option<JoinHandle<()>>,
}

impl TimeoutGuard {
    pub fn arm(token: CancellationToken, timeout: Duration) -> Self {
        let (disarm, disarmed) = mpsc::channel::<()>();
        let timer = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(timeout) {
                token.cancel();
            }
        });
        Self {
            disarm: Some(disarm),
            timer: Some(timer),
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        // Closing the channel wakes the timer with `Disconnected`.
        drop(self.disarm.take());
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_cancels_after_timeout() {
        let token = CancellationToken::new();
        let guard = TimeoutGuard::arm(token.clone(), Duration::from_millis(10));
        thread::sleep(Duration::from_millis(100));
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn dropped_guard_never_cancels() {
        let token = CancellationToken::new();
        let guard = TimeoutGuard::arm(token.clone(), Duration::from_millis(50));
        drop(guard);
        thread::sleep(Duration::from_millis(100));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn drop_returns_promptly_for_long_timeouts() {
        let token = CancellationToken::new();
        let started = Instant::now();
        drop(TimeoutGuard::arm(token.clone(), Duration::from_secs(60)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn remaining_counts_down_to_zero() {
        assert_eq!(remaining(Some(Instant::now())), Some(Duration::ZERO));
        assert_eq!(remaining(None), None);
        let later = Instant::now() + Duration::from_secs(5);
        assert!(remaining(Some(later)).unwrap() > Duration::from_secs(4));
    }
}
