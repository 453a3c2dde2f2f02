pub mod sources;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub const DEFAULT_BROKER_ADDRESS: &str = "nats://broker.mysterium.network:4222";
pub const DEFAULT_BROKER_CONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BROKER_CONNECT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_BIND_PORT: u16 = 9500;
pub const DEFAULT_PROPOSAL_LIFETIME: Duration = Duration::from_secs(190);
pub const DEFAULT_EXPIRATION_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_QUALITY_ORACLE: &str = "https://quality.mysterium.network";
pub const DEFAULT_QUALITY_INTERVAL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_QUALITY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 20;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub server: ServerConfig,
    pub proposals: ProposalConfig,
    pub quality: QualityConfig,
    pub rate_limit: RateLimitConfig,
    pub security: SecurityConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub address: String,
    /// Connection attempts before startup gives up.
    pub connect_attempts: u32,
    /// Pause between failed connection attempts.
    pub connect_backoff: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROKER_ADDRESS.to_string(),
            connect_attempts: DEFAULT_BROKER_CONNECT_ATTEMPTS,
            connect_backoff: DEFAULT_BROKER_CONNECT_BACKOFF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Serves both the query API and the metrics endpoint.
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_BIND_PORT)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProposalConfig {
    pub lifetime: Duration,
    pub expiration_interval: Duration,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_PROPOSAL_LIFETIME,
            expiration_interval: DEFAULT_EXPIRATION_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityConfig {
    pub oracle_url: String,
    pub update_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            oracle_url: DEFAULT_QUALITY_ORACLE.to_string(),
            update_interval: DEFAULT_QUALITY_INTERVAL,
            request_timeout: DEFAULT_QUALITY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_LIMIT_WINDOW,
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Identify API clients by the first `X-Forwarded-For` hop instead of
    /// the peer address.
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
