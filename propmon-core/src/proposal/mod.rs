//! Service proposal types as announced on the broker.
//!
//! A proposal is one provider's offering of one service type. The pair
//! `(provider_id, service_type)` identifies it; a later announcement for the
//! same pair supersedes the earlier one.

mod filter;
mod provider;

pub use filter::ProposalFilter;
pub use provider::{Provider, Service};

use serde::{Deserialize, Deserializer, Serialize};

/// A service offering announced by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub compatibility: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provider_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: Location,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contacts: Vec<Contact>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quality: Quality,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub access_policies: Vec<AccessPolicy>,
}

impl Proposal {
    /// Store key of this proposal: `provider_id.service_type`.
    pub fn service_key(&self) -> String {
        service_key(&self.provider_id, &self.service_type)
    }

    /// A proposal without a provider or service type cannot be keyed
    /// meaningfully and is rejected at ingestion.
    pub fn is_addressable(&self) -> bool {
        !self.provider_id.is_empty() && !self.service_type.is_empty()
    }
}

/// Builds the store key for a provider and service type.
pub fn service_key(provider_id: &str, service_type: &str) -> String {
    let mut key =
        String::with_capacity(provider_id.len() + service_type.len() + 1);
    key.push_str(provider_id);
    key.push('.');
    key.push_str(service_type);
    key
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    #[serde(deserialize_with = "null_as_default")]
    pub continent: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(deserialize_with = "null_as_default")]
    pub region: String,
    #[serde(deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(deserialize_with = "null_as_default")]
    pub asn: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub isp: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub definition: ContactDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactDefinition {
    #[serde(deserialize_with = "null_as_default")]
    pub broker_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPolicy {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
}

/// Quality scores supplied by the quality oracle. Missing values are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quality {
    #[serde(deserialize_with = "null_as_default")]
    pub quality: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub latency: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub bandwidth: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub uptime: f64,
}

impl Quality {
    pub fn is_zero(&self) -> bool {
        self.quality == 0.0
            && self.latency == 0.0
            && self.bandwidth == 0.0
            && self.uptime == 0.0
    }
}

/// Reads an explicit JSON `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
