//! Metrics sink injected into every component that reports.
//!
//! Every method has a no-op default so sinks only implement what they
//! export, and tests can record the handful of calls they care about.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::proposal::{Proposal, Provider};

pub trait MetricsSink: Send + Sync + fmt::Debug {
    fn proposal_registered(&self) {}

    fn proposal_pinged(&self) {}

    fn proposal_unregistered(&self) {}

    fn proposal_invalid(&self) {}

    /// Payload bytes received on a bus subject.
    fn bytes_received(&self, _subject: &str, _bytes: usize) {}

    fn proposals_expired(&self, _count: usize) {}

    /// Snapshot of every stored proposal, taken after a sweep.
    fn active_proposals(&self, _proposals: &[Arc<Proposal>]) {}

    /// Snapshot of provider views, taken after a sweep.
    fn active_providers(&self, _providers: &[Provider]) {}

    /// A quality merge completed and touched `applied` records.
    fn quality_refreshed(&self, _applied: usize) {}

    fn quality_fetch_failed(&self) {}
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Gauge labels for provider aggregates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderLabel {
    pub country: String,
    pub node_type: String,
}

/// Provider count and quality averages for one label set.
///
/// An average is `None` when every provider under the label reported zero
/// for that dimension; such gauges are left unset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProviderAggregate {
    pub count: usize,
    pub quality: Option<f64>,
    pub latency: Option<f64>,
    pub bandwidth: Option<f64>,
    pub uptime: Option<f64>,
}

/// Number of proposals per service type.
pub fn count_by_service_type(
    proposals: &[Arc<Proposal>],
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for proposal in proposals {
        *counts.entry(proposal.service_type.clone()).or_insert(0) += 1;
    }
    counts
}

/// Groups providers by `(country, ip_type)` and averages their scores.
pub fn aggregate_providers(
    providers: &[Provider],
) -> BTreeMap<ProviderLabel, ProviderAggregate> {
    #[derive(Default)]
    struct Sums {
        count: usize,
        quality: f64,
        latency: f64,
        bandwidth: f64,
        uptime: f64,
    }

    let mut sums: BTreeMap<ProviderLabel, Sums> = BTreeMap::new();
    for provider in providers {
        let label = ProviderLabel {
            country: provider.location.country.clone(),
            node_type: provider.location.ip_type.clone(),
        };
        let entry = sums.entry(label).or_default();
        entry.count += 1;
        entry.quality += provider.quality.quality;
        entry.latency += provider.quality.latency;
        entry.bandwidth += provider.quality.bandwidth;
        entry.uptime += provider.quality.uptime;
    }

    sums.into_iter()
        .map(|(label, sums)| {
            let count = sums.count as f64;
            let average = |sum: f64| (sum != 0.0).then(|| sum / count);
            let aggregate = ProviderAggregate {
                count: sums.count,
                quality: average(sums.quality),
                latency: average(sums.latency),
                bandwidth: average(sums.bandwidth),
                uptime: average(sums.uptime),
            };
            (label, aggregate)
        })
        .collect()
}
