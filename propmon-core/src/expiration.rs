use std::{fmt, sync::Arc, time::Duration};

use tracing::debug;

use crate::{metrics::MetricsSink, schedule::PeriodicTask, store::ProposalStore};

/// Background job that evicts proposals whose deadline has passed and
/// publishes a snapshot of what is left.
pub struct ExpirationService {
    store: Arc<ProposalStore>,
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    task: PeriodicTask,
}

impl fmt::Debug for ExpirationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationService")
            .field("interval", &self.interval)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl ExpirationService {
    pub fn new(
        store: Arc<ProposalStore>,
        metrics: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            interval,
            task: PeriodicTask::new("expiration"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Starts the sweep loop. The first sweep runs immediately.
    pub fn start(&self) -> bool {
        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);
        debug!(interval = ?self.interval, "starting expiration service");
        self.task.start(Duration::ZERO, self.interval, move || {
            sweep(&store, metrics.as_ref());
            std::future::ready(())
        })
    }

    pub async fn stop(&self) {
        self.task.stop().await;
    }

    /// Runs a single sweep outside the loop.
    pub fn sweep_now(&self) -> usize {
        sweep(&self.store, self.metrics.as_ref())
    }
}

fn sweep(store: &ProposalStore, metrics: &dyn MetricsSink) -> usize {
    if store.is_empty() {
        return 0;
    }

    let expired = store.remove_expired();
    if expired > 0 {
        debug!(expired, remaining = store.count_proposals(), "expired proposals");
    }

    metrics.active_proposals(&store.proposals());
    metrics.active_providers(&store.providers());
    metrics.proposals_expired(expired);
    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Proposal;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        expired: Mutex<Vec<usize>>,
        snapshots: Mutex<Vec<usize>>,
    }

    impl MetricsSink for Recorder {
        fn proposals_expired(&self, count: usize) {
            self.expired.lock().push(count);
        }

        fn active_proposals(&self, proposals: &[Arc<Proposal>]) {
            self.snapshots.lock().push(proposals.len());
        }
    }

    fn proposal(provider: &str) -> Proposal {
        Proposal {
            provider_id: provider.into(),
            service_type: "wireguard".into(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_skips_reporting() {
        let store = Arc::new(ProposalStore::new(Duration::from_secs(10)));
        let recorder = Arc::new(Recorder::default());
        let service = ExpirationService::new(
            Arc::clone(&store),
            recorder.clone(),
            Duration::from_secs(5),
        );

        assert_eq!(service.sweep_now(), 0);
        assert!(recorder.expired.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_evicts_and_reports() {
        let store = Arc::new(ProposalStore::new(Duration::from_secs(10)));
        let recorder = Arc::new(Recorder::default());
        store.store(proposal("0x1"));
        store.store(proposal("0x2"));

        let service = ExpirationService::new(
            Arc::clone(&store),
            recorder.clone(),
            Duration::from_secs(4),
        );
        assert!(service.start());

        tokio::time::sleep(Duration::from_secs(6)).await;
        store.renew("0x2.wireguard");

        tokio::time::sleep(Duration::from_secs(7)).await;
        service.stop().await;

        assert!(!store.exists("0x1.wireguard"));
        assert!(store.exists("0x2.wireguard"));
        assert_eq!(recorder.expired.lock().iter().sum::<usize>(), 1);
        assert_eq!(recorder.snapshots.lock().last(), Some(&1));
    }
}
