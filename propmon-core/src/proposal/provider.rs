use serde::Serialize;

use super::{AccessPolicy, Contact, Location, Proposal, Quality};

/// All live proposals of one provider, grouped at query time.
///
/// Location and quality come from the last record visited for the provider;
/// the view is rebuilt from the store on every call and is never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provider {
    pub id: String,
    pub location: Location,
    pub quality: Quality,
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub service_type: String,
    pub compatibility: i64,
    pub contacts: Vec<Contact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub access_policies: Vec<AccessPolicy>,
}

impl Provider {
    pub(crate) fn from_proposal(proposal: &Proposal) -> Self {
        Self {
            id: proposal.provider_id.clone(),
            location: proposal.location.clone(),
            quality: proposal.quality,
            services: vec![Service::from(proposal)],
        }
    }

    pub(crate) fn absorb(&mut self, proposal: &Proposal) {
        self.location = proposal.location.clone();
        self.quality = proposal.quality;
        self.services.push(Service::from(proposal));
    }
}

impl From<&Proposal> for Service {
    fn from(proposal: &Proposal) -> Self {
        Self {
            service_type: proposal.service_type.clone(),
            compatibility: proposal.compatibility,
            contacts: proposal.contacts.clone(),
            access_policies: proposal.access_policies.clone(),
        }
    }
}
