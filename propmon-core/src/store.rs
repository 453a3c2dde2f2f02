//! Concurrent, TTL-indexed proposal store.
//!
//! The whole map sits behind a single reader/writer lock. Reads take the
//! shared side, every mutation takes the exclusive side, and no guard ever
//! leaves this module. Critical sections are pure in-memory work, so lock
//! hold times stay well below the cost of the network paths feeding them.
//!
//! Reads do not filter on expiry: a record whose deadline has passed stays
//! visible until the next [`ProposalStore::remove_expired`] sweep.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::proposal::{Proposal, ProposalFilter, Provider, Quality};

#[derive(Debug, Clone)]
struct ProposalRecord {
    proposal: Arc<Proposal>,
    expires_at: Instant,
}

/// Outcome of [`ProposalStore::renew_or_store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upsert {
    /// The key existed; only its deadline moved.
    Renewed,
    /// The key was absent and the payload was stored.
    Stored,
}

pub struct ProposalStore {
    lifetime: Duration,
    records: RwLock<HashMap<String, ProposalRecord>>,
}

impl fmt::Debug for ProposalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = self
            .records
            .try_read()
            .map(|guard| guard.len())
            .unwrap_or_default();
        f.debug_struct("ProposalStore")
            .field("lifetime", &self.lifetime)
            .field("records", &records)
            .finish()
    }
}

impl ProposalStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Deadline for a record touched now. Read only while holding the
    /// write lock so concurrent writers never move a deadline backwards.
    fn deadline(&self) -> Instant {
        Instant::now() + self.lifetime
    }

    /// Inserts or replaces the proposal under its service key.
    pub fn store(&self, proposal: Proposal) {
        let key = proposal.service_key();
        let proposal = Arc::new(proposal);
        let mut records = self.records.write();
        let record = ProposalRecord {
            proposal,
            expires_at: self.deadline(),
        };
        records.insert(key, record);
    }

    /// Pushes the deadline of an existing key. Returns `false` and writes
    /// nothing when the key is absent.
    pub fn renew(&self, key: &str) -> bool {
        let mut records = self.records.write();
        match records.get_mut(key) {
            Some(record) => {
                record.expires_at = self.deadline();
                true
            }
            None => false,
        }
    }

    /// Handles a liveness ping.
    ///
    /// An existing record keeps its body; only the deadline moves, so a
    /// sparse ping payload never clobbers data from a registration. The
    /// check and the write happen under one exclusive lock.
    pub fn renew_or_store(&self, proposal: Proposal) -> Upsert {
        let key = proposal.service_key();
        let mut records = self.records.write();
        let expires_at = self.deadline();

        if let Some(record) = records.get_mut(&key) {
            record.expires_at = expires_at;
            return Upsert::Renewed;
        }

        records.insert(
            key,
            ProposalRecord {
                proposal: Arc::new(proposal),
                expires_at,
            },
        );
        Upsert::Stored
    }

    /// Deletes the key. Returns whether a record was present.
    pub fn remove(&self, key: &str) -> bool {
        self.records.write().remove(key).is_some()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.records.read().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Proposal>> {
        self.records
            .read()
            .get(key)
            .map(|record| Arc::clone(&record.proposal))
    }

    /// Deadline of the key, if present.
    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.records.read().get(key).map(|record| record.expires_at)
    }

    /// Snapshot of every stored proposal in map order, expired or not.
    pub fn proposals(&self) -> Vec<Arc<Proposal>> {
        self.records
            .read()
            .values()
            .map(|record| Arc::clone(&record.proposal))
            .collect()
    }

    /// First `max` proposals accepted by `filter`, in map order.
    pub fn matching(
        &self,
        filter: &ProposalFilter,
        max: usize,
    ) -> Vec<Arc<Proposal>> {
        if max == 0 {
            return Vec::new();
        }

        self.records
            .read()
            .values()
            .filter(|record| filter.matches(&record.proposal))
            .take(max)
            .map(|record| Arc::clone(&record.proposal))
            .collect()
    }

    /// Groups live records by provider.
    pub fn providers(&self) -> Vec<Provider> {
        let records = self.records.read();
        let mut providers: HashMap<&str, Provider> = HashMap::new();

        for record in records.values() {
            let proposal = record.proposal.as_ref();
            match providers.get_mut(proposal.provider_id.as_str()) {
                Some(provider) => provider.absorb(proposal),
                None => {
                    providers.insert(
                        proposal.provider_id.as_str(),
                        Provider::from_proposal(proposal),
                    );
                }
            }
        }

        providers.into_values().collect()
    }

    /// Distinct countries across stored records, sorted.
    pub fn countries(&self) -> Vec<String> {
        let records = self.records.read();
        records
            .values()
            .map(|record| record.proposal.location.country.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    pub fn count_proposals(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn count_providers(&self) -> usize {
        let records = self.records.read();
        records
            .values()
            .map(|record| record.proposal.provider_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Merges oracle scores into stored records without touching deadlines.
    ///
    /// Keys the store does not hold are dropped. Returns the number of
    /// records updated. Snapshots already handed out keep their old score.
    pub fn update_quality(&self, data: &HashMap<String, Quality>) -> usize {
        let mut records = self.records.write();
        let mut updated = 0;

        for (key, quality) in data {
            if let Some(record) = records.get_mut(key) {
                Arc::make_mut(&mut record.proposal).quality = *quality;
                updated += 1;
            }
        }

        updated
    }

    /// Deletes every record whose deadline is strictly before now.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| record.expires_at >= now);
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Location;

    const LIFETIME: Duration = Duration::from_secs(10);

    fn proposal(provider: &str, service: &str, country: &str) -> Proposal {
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

    #[test]
    fn store_overwrites_same_key() {
        let store = ProposalStore::new(LIFETIME);
        store.store(proposal("p1", "wireguard", "DE"));
        store.store(proposal("p1", "wireguard", "FR"));

        assert_eq!(store.count_proposals(), 1);
        let stored = store.get("p1.wireguard").expect("stored");
        assert_eq!(stored.location.country, "FR");
    }

    #[test]
    fn get_and_remove_absent_keys_are_quiet() {
        let store = ProposalStore::new(LIFETIME);
        assert!(store.get("nobody.wireguard").is_none());
        assert!(!store.exists("nobody.wireguard"));
        assert!(!store.remove("nobody.wireguard"));
        assert!(!store.renew("nobody.wireguard"));
        assert!(store.is_empty());
    }

    #[test]
    fn renew_or_store_keeps_existing_body() {
        let store = ProposalStore::new(LIFETIME);
        let original = proposal("p1", "wireguard", "DE");
        store.store(original.clone());

        let mut ping = proposal("p1", "wireguard", "DE");
        ping.compatibility = 9;
        ping.contacts.clear();

        assert_eq!(store.renew_or_store(ping), Upsert::Renewed);
        assert_eq!(store.get("p1.wireguard").as_deref(), Some(&original));
    }

    #[test]
    fn renew_or_store_inserts_unknown_key() {
        let store = ProposalStore::new(LIFETIME);
        let ping = proposal("p2", "openvpn", "US");
        assert_eq!(store.renew_or_store(ping.clone()), Upsert::Stored);
        assert_eq!(store.get("p2.openvpn").as_deref(), Some(&ping));
    }

    #[test]
    fn matching_respects_filter_and_max() {
        let store = ProposalStore::new(LIFETIME);
        for i in 0..5 {
            store.store(proposal(&format!("p{i}"), "wireguard", "DE"));
        }
        store.store(proposal("p9", "openvpn", "US"));

        assert_eq!(store.matching(&ProposalFilter::new(), 100).len(), 6);
        assert_eq!(store.matching(&ProposalFilter::new(), 3).len(), 3);
        assert!(store.matching(&ProposalFilter::new(), 0).is_empty());

        let only_us = store.matching(&ProposalFilter::new().country("US"), 10);
        assert_eq!(only_us.len(), 1);
        assert_eq!(only_us[0].provider_id, "p9");

        let exact = ProposalFilter::new()
            .provider_id("p3")
            .service_type("wireguard")
            .country("DE")
            .ip_type("residential");
        let hits = store.matching(&exact, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].service_key(), "p3.wireguard");
    }

    #[test]
    fn providers_group_services() {
        let store = ProposalStore::new(LIFETIME);
        store.store(proposal("p1", "wireguard", "DE"));
        store.store(proposal("p1", "openvpn", "DE"));
        store.store(proposal("p2", "wireguard", "FR"));

        let mut providers = store.providers();
        providers.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].id, "p1");
        let mut services: Vec<_> = providers[0]
            .services
            .iter()
            .map(|s| s.service_type.as_str())
            .collect();
        services.sort_unstable();
        assert_eq!(services, ["openvpn", "wireguard"]);
        assert_eq!(providers[1].services.len(), 1);
        assert_eq!(store.count_providers(), 2);
    }

    #[test]
    fn countries_are_distinct_and_sorted() {
        let store = ProposalStore::new(LIFETIME);
        store.store(proposal("p1", "wireguard", "US"));
        store.store(proposal("p2", "wireguard", "DE"));
        store.store(proposal("p3", "openvpn", "DE"));

        assert_eq!(store.countries(), ["DE", "US"]);
    }

    #[test]
    fn update_quality_ignores_unknown_keys() {
        let store = ProposalStore::new(LIFETIME);
        let original = proposal("p1", "wireguard", "DE");
        store.store(original.clone());
        let deadline = store.expires_at("p1.wireguard");

        let mut data = HashMap::new();
        data.insert(
            "gone.wireguard".to_string(),
            Quality {
                quality: 3.0,
                ..Default::default()
            },
        );

        assert_eq!(store.update_quality(&data), 0);
        assert_eq!(store.count_proposals(), 1);
        assert_eq!(store.get("p1.wireguard").as_deref(), Some(&original));
        assert_eq!(store.expires_at("p1.wireguard"), deadline);
    }

    #[test]
    fn update_quality_leaves_handed_out_snapshots_alone() {
        let store = ProposalStore::new(LIFETIME);
        store.store(proposal("p1", "wireguard", "DE"));
        let before = store.get("p1.wireguard").expect("stored");

        let score = Quality {
            quality: 2.5,
            latency: 40.0,
            bandwidth: 90.0,
            uptime: 99.0,
        };
        let data = HashMap::from([("p1.wireguard".to_string(), score)]);

        assert_eq!(store.update_quality(&data), 1);
        assert!(before.quality.is_zero());
        assert_eq!(store.get("p1.wireguard").expect("stored").quality, score);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_expired_keeps_records_at_their_deadline() {
        let store = ProposalStore::new(LIFETIME);
        store.store(proposal("p1", "wireguard", "DE"));

        tokio::time::advance(LIFETIME).await;
        assert_eq!(store.remove_expired(), 0, "deadline equal to now stays");

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(store.remove_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn renew_moves_deadline_forward() {
        let store = ProposalStore::new(LIFETIME);
        store.store(proposal("p1", "wireguard", "DE"));
        let first = store.expires_at("p1.wireguard").expect("stored");

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.renew("p1.wireguard"));
        let second = store.expires_at("p1.wireguard").expect("stored");

        assert_eq!(second - first, Duration::from_secs(4));
    }
}
