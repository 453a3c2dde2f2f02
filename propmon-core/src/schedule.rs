//! Cancellable sleep-paced background loops.
//!
//! A [`PeriodicTask`] runs one tick, then sleeps the full interval, then
//! runs the next. A slow tick pushes the following one back by its own
//! duration and ticks can never overlap. Cancellation is observed both
//! during the sleep and during the optional initial delay; a tick that has
//! already started always runs to completion.

use std::{fmt, future::Future, time::Duration};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct Running {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PeriodicTask {
    name: &'static str,
    running: Mutex<Option<Running>>,
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl PeriodicTask {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Spawns the loop. Returns `false` without spawning when a loop
    /// started by this task is still alive.
    pub fn start<F, Fut>(
        &self,
        initial_delay: Duration,
        interval: Duration,
        mut tick: F,
    ) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running
            .as_ref()
            .is_some_and(|current| !current.handle.is_finished())
        {
            warn!(task = self.name, "background task already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let name = self.name;

        let handle = tokio::spawn(async move {
            debug!(task = name, "background task started");

            if !initial_delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(task = name, "background task stopped before first tick");
                        return;
                    }
                    _ = tokio::time::sleep(initial_delay) => {}
                }
            }

            loop {
                if token.is_cancelled() {
                    break;
                }

                tick().await;

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            debug!(task = name, "background task stopped");
        });

        *running = Some(Running { shutdown, handle });
        true
    }

    /// Signals the loop and waits until it has exited.
    pub async fn stop(&self) {
        let Some(Running { shutdown, handle }) = self.running.lock().take()
        else {
            return;
        };

        shutdown.cancel();
        if let Err(err) = handle.await {
            warn!(task = self.name, error = %err, "background task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn counting_tick(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_every_interval() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::new("test");
        assert!(task.start(
            Duration::ZERO,
            Duration::from_secs(10),
            counting_tick(&ticks)
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        task.stop().await;
        assert!(!task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_ignored_while_running() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::new("test");
        assert!(task.start(
            Duration::ZERO,
            Duration::from_secs(10),
            counting_tick(&ticks)
        ));
        assert!(!task.start(
            Duration::ZERO,
            Duration::from_secs(10),
            counting_tick(&ticks)
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        task.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_initial_delay_skips_first_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::new("test");
        task.start(
            Duration::from_secs(60),
            Duration::from_secs(10),
            counting_tick(&ticks),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        task.stop().await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_stop_returns() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::new("test");
        task.start(Duration::ZERO, Duration::from_secs(5), counting_tick(&ticks));

        tokio::time::sleep(Duration::from_secs(12)).await;
        task.stop().await;
        let observed = ticks.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), observed);
        assert_eq!(observed, 3);
    }
}
