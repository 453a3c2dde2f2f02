pub mod error;

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::debug;

use crate::{
    models::{
        BrokerConfig, Config, ConfigMetadata, ProposalConfig, QualityConfig,
        RateLimitConfig, SecurityConfig, ServerConfig,
        sources::{EnvConfig, FileConfig},
    },
    util::normalize_bind_address,
    validation::{self, ConfigWarnings},
};

pub use error::ConfigLoadError;

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["propmon.toml", "config/propmon.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Skip reading `.env` entirely.
    pub skip_env_file: bool,
}

/// Values supplied on the command line; they win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub broker_address: Option<String>,
    pub bind_address: Option<String>,
    pub proposal_lifetime: Option<Duration>,
    pub expiration_interval: Option<Duration>,
    pub quality_oracle: Option<String>,
    pub quality_update_interval: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
    overrides: ConfigOverrides,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.options.skip_env_file = true;
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let env_config = EnvConfig::gather();

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No propmon.toml detected; using defaults and environment variables",
                "Set PROPMON_CONFIG or pass --config to load a configuration file",
            );
        }

        let metadata = ConfigMetadata {
            config_path,
            env_file_loaded,
        };
        let config = compose_config(
            file_config.unwrap_or_default(),
            env_config,
            self.overrides.clone(),
            metadata,
        )?;

        warnings.extend(validation::apply_guard_rails(&config)?);
        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.options.skip_env_file {
            return Ok(false);
        }

        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };

        match loaded {
            Ok(loaded) => Ok(loaded),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    overrides: ConfigOverrides,
    metadata: ConfigMetadata,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        broker: file_broker,
        server: file_server,
        proposals: file_proposals,
        quality: file_quality,
        rate_limit: file_rate_limit,
        security: file_security,
    } = file;

    let broker_defaults = BrokerConfig::default();
    let broker = BrokerConfig {
        address: overrides
            .broker_address
            .or(env.broker_address)
            .or(file_broker.address)
            .unwrap_or(broker_defaults.address),
        connect_attempts: layered_count(
            "broker.connect_attempts",
            env.broker_connect_attempts,
            file_broker.connect_attempts,
            broker_defaults.connect_attempts,
        )?,
        connect_backoff: layered_duration(
            "broker.connect_backoff",
            None,
            env.broker_connect_backoff,
            file_broker.connect_backoff,
            broker_defaults.connect_backoff,
        )?,
    };

    let server = match overrides
        .bind_address
        .or(env.bind_address)
        .or(file_server.bind_address)
    {
        Some(raw) => ServerConfig {
            bind_address: parse_bind_address(&raw)?,
        },
        None => ServerConfig::default(),
    };

    let proposal_defaults = ProposalConfig::default();
    let proposals = ProposalConfig {
        lifetime: layered_duration(
            "proposals.lifetime",
            overrides.proposal_lifetime,
            env.proposal_lifetime,
            file_proposals.lifetime,
            proposal_defaults.lifetime,
        )?,
        expiration_interval: layered_duration(
            "proposals.expiration_interval",
            overrides.expiration_interval,
            env.expiration_interval,
            file_proposals.expiration_interval,
            proposal_defaults.expiration_interval,
        )?,
    };

    let quality_defaults = QualityConfig::default();
    let quality = QualityConfig {
        oracle_url: overrides
            .quality_oracle
            .or(env.quality_oracle)
            .or(file_quality.oracle_url)
            .unwrap_or(quality_defaults.oracle_url),
        update_interval: layered_duration(
            "quality.update_interval",
            overrides.quality_update_interval,
            env.quality_update_interval,
            file_quality.update_interval,
            quality_defaults.update_interval,
        )?,
        request_timeout: layered_duration(
            "quality.request_timeout",
            None,
            env.quality_request_timeout,
            file_quality.request_timeout,
            quality_defaults.request_timeout,
        )?,
    };

    let rate_defaults = RateLimitConfig::default();
    let rate_limit = RateLimitConfig {
        window: layered_duration(
            "rate_limit.window",
            None,
            env.rate_limit_window,
            file_rate_limit.window,
            rate_defaults.window,
        )?,
        max_requests: layered_count(
            "rate_limit.max_requests",
            env.rate_limit_max_requests,
            file_rate_limit.max_requests,
            rate_defaults.max_requests,
        )?,
    };

    let security = SecurityConfig {
        trust_proxy_headers: env
            .trust_proxy_headers
            .or(file_security.trust_proxy_headers)
            .unwrap_or(false),
    };

    Ok(Config {
        broker,
        server,
        proposals,
        quality,
        rate_limit,
        security,
        metadata,
    })
}

/// Resolves one duration setting: override, then env, then file, then the
/// default. Only the winning raw value is parsed.
fn layered_duration(
    field: &'static str,
    overridden: Option<Duration>,
    env: Option<String>,
    file: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    if let Some(value) = overridden {
        return Ok(value);
    }

    match env.or(file) {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value: raw,
                source,
            }
        }),
        None => Ok(default),
    }
}

/// Resolves a count setting: env, then file, then the default. A set but
/// unparsable env value is an error rather than a silent fallback.
fn layered_count(
    field: &'static str,
    env: Option<String>,
    file: Option<u32>,
    default: u32,
) -> Result<u32, ConfigLoadError> {
    match env {
        Some(raw) => raw.trim().parse().map_err(|source| {
            ConfigLoadError::InvalidNumber {
                field,
                value: raw,
                source,
            }
        }),
        None => Ok(file.unwrap_or(default)),
    }
}

fn parse_bind_address(raw: &str) -> Result<SocketAddr, ConfigLoadError> {
    let normalized = normalize_bind_address(raw);
    normalized.parse().map_err(|source| {
        ConfigLoadError::InvalidBindAddress {
            value: raw.to_string(),
            source,
        }
    })
}
