use std::{fmt, sync::Arc, time::Instant};

use propmon_core::{FixedWindowLimiter, ProposalStore};

use super::metrics::PrometheusMetrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ProposalStore>,
    pub metrics: Arc<PrometheusMetrics>,
    pub limiter: Arc<FixedWindowLimiter>,
    /// Identify clients by `X-Forwarded-For` instead of the peer address.
    pub trust_proxy_headers: bool,
    pub started_at: Instant,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("limiter", &self.limiter)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        store: Arc<ProposalStore>,
        metrics: Arc<PrometheusMetrics>,
        limiter: Arc<FixedWindowLimiter>,
        trust_proxy_headers: bool,
    ) -> Self {
        Self {
            store,
            metrics,
            limiter,
            trust_proxy_headers,
            started_at: Instant::now(),
        }
    }
}
