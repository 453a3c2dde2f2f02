use super::Proposal;

/// Exact-match filter over proposal fields.
///
/// `None` and empty strings are wildcards. Populated fields must match
/// exactly; comparison is case-sensitive with no prefix matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalFilter {
    pub provider_id: Option<String>,
    pub service_type: Option<String>,
    pub country: Option<String>,
    pub ip_type: Option<String>,
}

impl ProposalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_id(mut self, value: impl Into<String>) -> Self {
        self.provider_id = Some(value.into());
        self
    }

    pub fn service_type(mut self, value: impl Into<String>) -> Self {
        self.service_type = Some(value.into());
        self
    }

    pub fn country(mut self, value: impl Into<String>) -> Self {
        self.country = Some(value.into());
        self
    }

    pub fn ip_type(mut self, value: impl Into<String>) -> Self {
        self.ip_type = Some(value.into());
        self
    }

    pub fn matches(&self, proposal: &Proposal) -> bool {
        field_matches(&self.provider_id, &proposal.provider_id)
            && field_matches(&self.service_type, &proposal.service_type)
            && field_matches(&self.country, &proposal.location.country)
            && field_matches(&self.ip_type, &proposal.location.ip_type)
    }
}

fn field_matches(wanted: &Option<String>, actual: &str) -> bool {
    match wanted.as_deref() {
        None | Some("") => true,
        Some(wanted) => wanted == actual,
    }
}
