use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::parse_bool_var;

/// Raw configuration as defined in a TOML file.
///
/// Durations stay as strings here and are parsed with `humantime` while the
/// layers are composed, so a bad value can be reported with its origin.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub broker: FileBrokerConfig,
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub proposals: FileProposalConfig,
    #[serde(default)]
    pub quality: FileQualityConfig,
    #[serde(default)]
    pub rate_limit: FileRateLimitConfig,
    #[serde(default)]
    pub security: FileSecurityConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileBrokerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_backoff: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileProposalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_interval: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileQualityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileRateLimitConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileSecurityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_proxy_headers: Option<bool>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub broker_address: Option<String>,
    pub broker_connect_attempts: Option<String>,
    pub broker_connect_backoff: Option<String>,
    pub bind_address: Option<String>,
    pub proposal_lifetime: Option<String>,
    pub expiration_interval: Option<String>,
    pub quality_oracle: Option<String>,
    pub quality_update_interval: Option<String>,
    pub quality_request_timeout: Option<String>,
    pub rate_limit_window: Option<String>,
    pub rate_limit_max_requests: Option<String>,
    pub trust_proxy_headers: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("PROPMON_CONFIG").map(PathBuf::from),
            broker_address: non_empty_var("BROKER_ADDRESS"),
            broker_connect_attempts: non_empty_var("BROKER_CONNECT_ATTEMPTS"),
            broker_connect_backoff: non_empty_var("BROKER_CONNECT_BACKOFF"),
            bind_address: non_empty_var("METRICS_ADDRESS"),
            proposal_lifetime: non_empty_var("PROPOSAL_LIFETIME"),
            expiration_interval: non_empty_var("EXPIRATION_JOB_DELAY"),
            quality_oracle: non_empty_var("QUALITY_ORACLE"),
            quality_update_interval: non_empty_var("QUALITY_UPDATE_INTERVAL"),
            quality_request_timeout: non_empty_var("QUALITY_REQUEST_TIMEOUT"),
            rate_limit_window: non_empty_var("RATE_LIMIT_WINDOW"),
            rate_limit_max_requests: non_empty_var("RATE_LIMIT_MAX_REQUESTS"),
            trust_proxy_headers: parse_bool_var("TRUST_PROXY_HEADERS"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
