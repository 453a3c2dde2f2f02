//! Wiring of the background jobs around the shared store.

use std::{fmt, sync::Arc};

use propmon_config::Config;
use propmon_core::{
    ExpirationService, HttpQualityOracle, MetricsSink, OracleError,
    ProposalStore, QualityOracle, QualityService,
};
use tracing::info;

pub struct BackgroundServices {
    pub expiration: ExpirationService,
    pub quality: QualityService,
}

impl fmt::Debug for BackgroundServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundServices")
            .field("expiration", &self.expiration)
            .field("quality", &self.quality)
            .finish()
    }
}

impl BackgroundServices {
    pub fn from_config(
        config: &Config,
        store: Arc<ProposalStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, OracleError> {
        let oracle: Arc<dyn QualityOracle> = Arc::new(HttpQualityOracle::new(
            &config.quality.oracle_url,
            config.quality.request_timeout,
        )?);
        Ok(Self::new(oracle, store, metrics, config))
    }

    pub fn new(
        oracle: Arc<dyn QualityOracle>,
        store: Arc<ProposalStore>,
        metrics: Arc<dyn MetricsSink>,
        config: &Config,
    ) -> Self {
        let expiration = ExpirationService::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            config.proposals.expiration_interval,
        );
        let quality = QualityService::new(
            oracle,
            store,
            metrics,
            config.quality.update_interval,
        );
        Self {
            expiration,
            quality,
        }
    }

    pub fn start(&self) {
        self.expiration.start();
        self.quality.start();
        info!("background services started");
    }

    /// Stops the sweeper, then the refresher, waiting for each loop to exit.
    pub async fn stop(&self) {
        self.expiration.stop().await;
        self.quality.stop().await;
        info!("background services stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use async_trait::async_trait;
    use propmon_core::{NoopMetrics, Quality};

    use super::*;

    #[derive(Debug)]
    struct EmptyOracle;

    #[async_trait]
    impl QualityOracle for EmptyOracle {
        async fn fetch(&self) -> Result<HashMap<String, Quality>, OracleError> {
            Ok(HashMap::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starts_and_stops_both_jobs() {
        let store = Arc::new(ProposalStore::new(Duration::from_secs(10)));
        let services = BackgroundServices::new(
            Arc::new(EmptyOracle),
            store,
            Arc::new(NoopMetrics),
            &Config::default(),
        );

        services.start();
        assert!(services.expiration.is_running());
        assert!(services.quality.is_running());

        services.stop().await;
        assert!(!services.expiration.is_running());
        assert!(!services.quality.is_running());
    }

    #[test]
    fn default_oracle_url_builds_a_client() {
        let store = Arc::new(ProposalStore::new(Duration::from_secs(10)));
        let services = BackgroundServices::from_config(
            &Config::default(),
            store,
            Arc::new(NoopMetrics),
        );
        assert!(services.is_ok());
    }
}
