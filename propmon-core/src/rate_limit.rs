//! Fixed-window admission control for the read API.
//!
//! Every client gets `max` requests per window. All counters are cleared at
//! once when the window rolls over, so a client can burst up to `2 * max`
//! across a boundary.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed {
        /// Requests counted for the client in this window, this one included.
        count: u32,
    },
    Rejected {
        count: u32,
        /// Time until the current window resets.
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    counts: HashMap<String, u32>,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    max: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl FixedWindowLimiter {
    /// Creates a limiter without a reset timer; callers drive
    /// [`FixedWindowLimiter::reset`] themselves.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                counts: HashMap::new(),
            }),
        }
    }

    /// Creates a shared limiter and spawns its reset timer.
    ///
    /// The timer only holds a weak reference and exits on the first tick
    /// after the last strong reference is gone.
    pub fn spawn(max: u32, window: Duration) -> Arc<Self> {
        let limiter = Arc::new(Self::new(max, window));
        let weak = Arc::downgrade(&limiter);

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + window, window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                limiter.reset();
            }
            trace!("rate limiter reset timer finished");
        });

        limiter
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts the request and decides on it. Rejected requests are counted
    /// too.
    pub fn check(&self, client: &str) -> Admission {
        let mut state = self.state.lock();
        let count = match state.counts.get_mut(client) {
            Some(count) => {
                *count = count.saturating_add(1);
                *count
            }
            None => {
                state.counts.insert(client.to_owned(), 1);
                1
            }
        };

        if count > self.max {
            let elapsed = state.started.elapsed();
            Admission::Rejected {
                count,
                retry_after: self.window.saturating_sub(elapsed),
            }
        } else {
            Admission::Allowed { count }
        }
    }

    /// Clears every counter and starts a new window.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.counts.clear();
        state.started = Instant::now();
    }

    /// Number of clients seen in the current window.
    pub fn tracked_clients(&self) -> usize {
        self.state.lock().counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourth_request_is_rejected_until_reset() {
        let limiter = FixedWindowLimiter::new(3, Duration::from_secs(60));
        for expected in 1..=3 {
            assert_eq!(
                limiter.check("10.0.0.1"),
                Admission::Allowed { count: expected }
            );
        }
        assert!(!limiter.check("10.0.0.1").is_allowed());
        assert!(limiter.check("10.0.0.2").is_allowed());

        limiter.reset();
        assert_eq!(limiter.check("10.0.0.1"), Admission::Allowed { count: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_counts_down_to_window_end() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").is_allowed());

        tokio::time::advance(Duration::from_secs(15)).await;
        match limiter.check("a") {
            Admission::Rejected { retry_after, count } => {
                assert_eq!(count, 2);
                assert_eq!(retry_after, Duration::from_secs(45));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_resets_every_window() {
        let limiter = FixedWindowLimiter::spawn(1, Duration::from_secs(10));
        assert!(limiter.check("a").is_allowed());
        assert!(!limiter.check("a").is_allowed());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(limiter.check("a").is_allowed());
    }
}
