//! Decoding and dispatch of proposal announcements received from the bus.

use std::{fmt, sync::Arc};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    error::IngestError,
    metrics::MetricsSink,
    proposal::Proposal,
    store::{ProposalStore, Upsert},
};

/// Wildcard subjects the listener subscribes to.
pub const PING_SUBJECT: &str = "*.proposal-ping.v3";
pub const REGISTER_SUBJECT: &str = "*.proposal-register.v3";
pub const UNREGISTER_SUBJECT: &str = "*.proposal-unregister.v3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Ping,
    Register,
    Unregister,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] =
        [MessageKind::Ping, MessageKind::Register, MessageKind::Unregister];

    pub fn subscription(self) -> &'static str {
        match self {
            MessageKind::Ping => PING_SUBJECT,
            MessageKind::Register => REGISTER_SUBJECT,
            MessageKind::Unregister => UNREGISTER_SUBJECT,
        }
    }

    /// Classifies a concrete subject such as `0xabc.proposal-ping.v3`.
    pub fn from_subject(subject: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            let suffix = kind.subscription().trim_start_matches('*');
            subject.strip_suffix(suffix).is_some_and(|prefix| {
                !prefix.is_empty() && !prefix.contains('.')
            })
        })
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::Ping => "ping",
            MessageKind::Register => "register",
            MessageKind::Unregister => "unregister",
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(alias = "Proposal")]
    proposal: Option<Proposal>,
}

/// Decodes a bus payload into an addressable proposal.
pub fn decode_proposal(payload: &[u8]) -> Result<Proposal, IngestError> {
    let envelope: Envelope = serde_json::from_slice(payload)?;
    let proposal = envelope.proposal.ok_or(IngestError::MissingProposal)?;
    if !proposal.is_addressable() {
        return Err(IngestError::Unaddressable);
    }
    Ok(proposal)
}

/// What a handled message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Renewed,
    Stored,
    Removed { existed: bool },
}

/// Applies bus messages to the store and reports them.
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: Arc<ProposalStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl Ingestor {
    pub fn new(
        store: Arc<ProposalStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { store, metrics }
    }

    /// Routes a message by its concrete subject.
    pub fn handle_subject(
        &self,
        subject: &str,
        payload: &[u8],
    ) -> Result<Applied, IngestError> {
        self.metrics.bytes_received(subject, payload.len());
        let kind = MessageKind::from_subject(subject)
            .ok_or_else(|| IngestError::UnknownSubject(subject.to_owned()))?;
        self.apply(kind, payload)
    }

    /// Applies a message whose kind is already known. Byte accounting is
    /// left to the caller.
    pub fn apply(
        &self,
        kind: MessageKind,
        payload: &[u8],
    ) -> Result<Applied, IngestError> {
        let proposal = match decode_proposal(payload) {
            Ok(proposal) => proposal,
            Err(err) => {
                debug!(%kind, error = %err, "dropping invalid proposal message");
                self.metrics.proposal_invalid();
                return Err(err);
            }
        };

        let applied = match kind {
            MessageKind::Ping => {
                let outcome = self.store.renew_or_store(proposal);
                self.metrics.proposal_pinged();
                match outcome {
                    Upsert::Renewed => Applied::Renewed,
                    Upsert::Stored => Applied::Stored,
                }
            }
            MessageKind::Register => {
                self.store.store(proposal);
                self.metrics.proposal_registered();
                Applied::Stored
            }
            MessageKind::Unregister => {
                let existed = self.store.remove(&proposal.service_key());
                self.metrics.proposal_unregistered();
                Applied::Removed { existed }
            }
        };

        trace!(%kind, ?applied, "applied proposal message");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_concrete_subjects() {
        assert_eq!(
            MessageKind::from_subject("0xabc.proposal-ping.v3"),
            Some(MessageKind::Ping)
        );
        assert_eq!(
            MessageKind::from_subject("0xabc.proposal-register.v3"),
            Some(MessageKind::Register)
        );
        assert_eq!(
            MessageKind::from_subject("0xabc.proposal-unregister.v3"),
            Some(MessageKind::Unregister)
        );
        assert_eq!(MessageKind::from_subject("proposal-ping.v3"), None);
        assert_eq!(MessageKind::from_subject(".proposal-ping.v3"), None);
        assert_eq!(MessageKind::from_subject("a.b.proposal-ping.v3"), None);
        assert_eq!(MessageKind::from_subject("0xabc.proposal-ping.v2"), None);
    }

    #[test]
    fn decodes_both_envelope_spellings() {
        let lower = br#"{"proposal": {"provider_id": "0x1", "service_type": "wireguard"}}"#;
        let upper = br#"{"Proposal": {"provider_id": "0x1", "service_type": "wireguard"}}"#;
        assert_eq!(decode_proposal(lower).expect("lower").provider_id, "0x1");
        assert_eq!(decode_proposal(upper).expect("upper").provider_id, "0x1");
    }

    #[test]
    fn accepts_null_optional_fields() {
        let payload = br#"{"proposal": {
            "provider_id": "0x1",
            "service_type": "wireguard",
            "contacts": [{"type": "nats/v1", "definition": {"broker_addresses": null}}],
            "access_policies": null,
            "quality": null
        }}"#;

        let proposal = decode_proposal(payload).expect("decode");
        assert_eq!(proposal.service_key(), "0x1.wireguard");
        assert!(proposal.contacts[0].definition.broker_addresses.is_empty());
        assert!(proposal.access_policies.is_empty());
        assert!(proposal.quality.is_zero());

        let null_contacts = br#"{"proposal": {"provider_id": "0x1", "service_type": "wireguard", "contacts": null}}"#;
        assert!(decode_proposal(null_contacts).expect("decode").contacts.is_empty());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            decode_proposal(b"{not json"),
            Err(IngestError::Malformed(_))
        ));
        assert!(matches!(
            decode_proposal(br#"{"other": 1}"#),
            Err(IngestError::MissingProposal)
        ));
        assert!(matches!(
            decode_proposal(br#"{"proposal": null}"#),
            Err(IngestError::MissingProposal)
        ));
        assert!(matches!(
            decode_proposal(br#"{"proposal": {"provider_id": "0x1"}}"#),
            Err(IngestError::Unaddressable)
        ));
    }
}
