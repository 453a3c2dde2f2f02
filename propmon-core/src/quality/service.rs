use std::{fmt, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    metrics::MetricsSink, schedule::PeriodicTask, store::ProposalStore,
};

use super::QualityOracle;

/// Background job merging oracle scores into the store.
///
/// The first fetch waits one proposal lifetime so most live proposals have
/// been seen by then. A failed fetch is logged and the next tick retries.
pub struct QualityService {
    oracle: Arc<dyn QualityOracle>,
    store: Arc<ProposalStore>,
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    initial_delay: Duration,
    task: PeriodicTask,
}

impl fmt::Debug for QualityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityService")
            .field("oracle", &self.oracle)
            .field("interval", &self.interval)
            .field("initial_delay", &self.initial_delay)
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl QualityService {
    pub fn new(
        oracle: Arc<dyn QualityOracle>,
        store: Arc<ProposalStore>,
        metrics: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        let initial_delay = store.lifetime();
        Self {
            oracle,
            store,
            metrics,
            interval,
            initial_delay,
            task: PeriodicTask::new("quality"),
        }
    }

    /// Overrides the wait before the first fetch.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn start(&self) -> bool {
        let oracle = Arc::clone(&self.oracle);
        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);
        debug!(
            interval = ?self.interval,
            initial_delay = ?self.initial_delay,
            "starting quality service"
        );

        self.task.start(self.initial_delay, self.interval, move || {
            let oracle = Arc::clone(&oracle);
            let store = Arc::clone(&store);
            let metrics = Arc::clone(&metrics);
            async move {
                refresh(oracle.as_ref(), &store, metrics.as_ref()).await;
            }
        })
    }

    pub async fn stop(&self) {
        self.task.stop().await;
    }

    /// Runs one fetch-and-merge cycle outside the loop. Returns the number
    /// of records updated, or `None` when the fetch failed.
    pub async fn refresh_now(&self) -> Option<usize> {
        refresh(self.oracle.as_ref(), &self.store, self.metrics.as_ref()).await
    }
}

async fn refresh(
    oracle: &dyn QualityOracle,
    store: &ProposalStore,
    metrics: &dyn MetricsSink,
) -> Option<usize> {
    let data = match oracle.fetch().await {
        Ok(data) => data,
        Err(err) => {
            warn!(error = %err, "failed to update quality data");
            metrics.quality_fetch_failed();
            return None;
        }
    };

    let applied = store.update_quality(&data);
    debug!(fetched = data.len(), applied, "merged quality data");
    metrics.quality_refreshed(applied);
    Some(applied)
}
