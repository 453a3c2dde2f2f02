//! Prometheus export of the core metrics sink.

use std::{fmt, sync::Arc};

use prometheus::{
    Encoder, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use propmon_core::{
    MetricsSink, Proposal, Provider,
    metrics::{aggregate_providers, count_by_service_type},
};

const PROVIDER_LABELS: [&str; 2] = ["country", "node_type"];

/// Metrics registered on a private registry so the exposition only carries
/// propmon series.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    proposal_registered: IntCounter,
    proposal_ping: IntCounter,
    proposal_unregistered: IntCounter,
    proposal_expired: IntCounter,
    proposal_invalid: IntCounter,
    nats_bytes_rx: IntCounterVec,
    quality_updates: IntCounter,
    quality_fetch_failures: IntCounter,
    proposal_count: IntGaugeVec,
    provider_count: IntGaugeVec,
    quality: GaugeVec,
    latency: GaugeVec,
    bandwidth: GaugeVec,
    uptime: GaugeVec,
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok::<_, prometheus::Error>(counter)
        };
        let provider_gauge = |name: &str, help: &str| {
            let gauge =
                GaugeVec::new(Opts::new(name, help), &PROVIDER_LABELS)?;
            registry.register(Box::new(gauge.clone()))?;
            Ok::<_, prometheus::Error>(gauge)
        };

        let proposal_registered = counter(
            "propmon_proposal_registered",
            "Service proposals registered",
        )?;
        let proposal_ping =
            counter("propmon_proposal_ping", "Service proposal pings")?;
        let proposal_unregistered = counter(
            "propmon_proposal_unregistered",
            "Service proposals unregistered",
        )?;
        let proposal_expired =
            counter("propmon_proposal_expired", "Service proposals expired")?;
        let proposal_invalid = counter(
            "propmon_proposal_invalid",
            "Invalid service proposal messages",
        )?;
        let quality_updates = counter(
            "propmon_quality_updates",
            "Successful quality data merges",
        )?;
        let quality_fetch_failures = counter(
            "propmon_quality_fetch_failures",
            "Failed quality oracle requests",
        )?;

        let nats_bytes_rx = IntCounterVec::new(
            Opts::new(
                "propmon_nats_bytes_rx",
                "Number of bytes received by the broker listener",
            ),
            &["subject"],
        )?;
        registry.register(Box::new(nats_bytes_rx.clone()))?;

        let proposal_count = IntGaugeVec::new(
            Opts::new("propmon_proposal_count", "Service proposal count"),
            &["service_type"],
        )?;
        registry.register(Box::new(proposal_count.clone()))?;

        let provider_count = IntGaugeVec::new(
            Opts::new("propmon_provider_count", "Provider count"),
            &PROVIDER_LABELS,
        )?;
        registry.register(Box::new(provider_count.clone()))?;

        let quality = provider_gauge(
            "propmon_quality",
            "Average quality score for country and node type",
        )?;
        let latency = provider_gauge(
            "propmon_latency",
            "Average latency for country and node type",
        )?;
        let bandwidth = provider_gauge(
            "propmon_bandwidth",
            "Average bandwidth for country and node type",
        )?;
        let uptime = provider_gauge(
            "propmon_uptime",
            "Average uptime for country and node type",
        )?;

        Ok(Self {
            registry,
            proposal_registered,
            proposal_ping,
            proposal_unregistered,
            proposal_expired,
            proposal_invalid,
            nats_bytes_rx,
            quality_updates,
            quality_fetch_failures,
            proposal_count,
            provider_count,
            quality,
            latency,
            bandwidth,
            uptime,
        })
    }

    /// Renders every registered series in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|err| prometheus::Error::Msg(err.to_string()))
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl MetricsSink for PrometheusMetrics {
    fn proposal_registered(&self) {
        self.proposal_registered.inc();
    }

    fn proposal_pinged(&self) {
        self.proposal_ping.inc();
    }

    fn proposal_unregistered(&self) {
        self.proposal_unregistered.inc();
    }

    fn proposal_invalid(&self) {
        self.proposal_invalid.inc();
    }

    fn bytes_received(&self, subject: &str, bytes: usize) {
        self.nats_bytes_rx
            .with_label_values(&[subject])
            .inc_by(bytes as u64);
    }

    fn proposals_expired(&self, count: usize) {
        self.proposal_expired.inc_by(count as u64);
    }

    fn active_proposals(&self, proposals: &[Arc<Proposal>]) {
        self.proposal_count.reset();
        for (service_type, count) in count_by_service_type(proposals) {
            self.proposal_count
                .with_label_values(&[service_type.as_str()])
                .set(count as i64);
        }
    }

    fn active_providers(&self, providers: &[Provider]) {
        self.provider_count.reset();
        for gauge in
            [&self.quality, &self.latency, &self.bandwidth, &self.uptime]
        {
            gauge.reset();
        }

        for (label, aggregate) in aggregate_providers(providers) {
            let values = [label.country.as_str(), label.node_type.as_str()];
            self.provider_count
                .with_label_values(&values)
                .set(aggregate.count as i64);

            for (gauge, average) in [
                (&self.quality, aggregate.quality),
                (&self.latency, aggregate.latency),
                (&self.bandwidth, aggregate.bandwidth),
                (&self.uptime, aggregate.uptime),
            ] {
                if let Some(average) = average {
                    gauge.with_label_values(&values).set(average);
                }
            }
        }
    }

    fn quality_refreshed(&self, _applied: usize) {
        self.quality_updates.inc();
    }

    fn quality_fetch_failed(&self) {
        self.quality_fetch_failures.inc();
    }
}
