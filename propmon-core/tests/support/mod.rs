#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use propmon_core::{Location, MetricsSink, Proposal, Provider};

pub fn proposal(provider: &str, service: &str, country: &str) -> Proposal {
    Proposal {
        format: "service-proposal/v3".into(),
        compatibility: 2,
        provider_id: provider.into(),
        service_type: service.into(),
        location: Location {
            country: country.into(),
            ip_type: "residential".into(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn envelope(proposal: &Proposal) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "proposal": proposal }))
        .expect("encode envelope")
}

/// Sink that keeps every call for later assertions.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    pub registered: Mutex<usize>,
    pub pinged: Mutex<usize>,
    pub unregistered: Mutex<usize>,
    pub invalid: Mutex<usize>,
    pub bytes: Mutex<Vec<(String, usize)>>,
    pub expired: Mutex<Vec<usize>>,
    pub proposal_snapshots: Mutex<Vec<usize>>,
    pub provider_snapshots: Mutex<Vec<usize>>,
    pub refreshes: Mutex<Vec<usize>>,
    pub fetch_failures: Mutex<usize>,
}

impl RecordingMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl MetricsSink for RecordingMetrics {
    fn proposal_registered(&self) {
        *self.registered.lock() += 1;
    }

    fn proposal_pinged(&self) {
        *self.pinged.lock() += 1;
    }

    fn proposal_unregistered(&self) {
        *self.unregistered.lock() += 1;
    }

    fn proposal_invalid(&self) {
        *self.invalid.lock() += 1;
    }

    fn bytes_received(&self, subject: &str, bytes: usize) {
        self.bytes.lock().push((subject.to_owned(), bytes));
    }

    fn proposals_expired(&self, count: usize) {
        self.expired.lock().push(count);
    }

    fn active_proposals(&self, proposals: &[Arc<Proposal>]) {
        self.proposal_snapshots.lock().push(proposals.len());
    }

    fn active_providers(&self, providers: &[Provider]) {
        self.provider_snapshots.lock().push(providers.len());
    }

    fn quality_refreshed(&self, applied: usize) {
        self.refreshes.lock().push(applied);
    }

    fn quality_fetch_failed(&self) {
        *self.fetch_failures.lock() += 1;
    }
}
