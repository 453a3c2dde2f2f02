use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::models::Config;

const MIN_QUALITY_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
    #[error("{field} is not a valid URL: '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{field} must use one of the schemes {expected}, got '{scheme}'")]
    UnsupportedScheme {
        field: &'static str,
        scheme: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    for (field, value) in [
        ("proposals.lifetime", config.proposals.lifetime),
        (
            "proposals.expiration_interval",
            config.proposals.expiration_interval,
        ),
        ("quality.update_interval", config.quality.update_interval),
        ("quality.request_timeout", config.quality.request_timeout),
        ("rate_limit.window", config.rate_limit.window),
    ] {
        if value.is_zero() {
            return Err(ConfigGuardRailError::ZeroDuration { field });
        }
    }

    if config.rate_limit.max_requests == 0 {
        return Err(ConfigGuardRailError::ZeroCount {
            field: "rate_limit.max_requests",
        });
    }
    if config.broker.connect_attempts == 0 {
        return Err(ConfigGuardRailError::ZeroCount {
            field: "broker.connect_attempts",
        });
    }

    validate_url(
        "broker.address",
        &config.broker.address,
        &["nats", "tls", "ws", "wss"],
        "nats, tls, ws, wss",
    )?;
    validate_url(
        "quality.oracle_url",
        &config.quality.oracle_url,
        &["http", "https"],
        "http, https",
    )?;

    if config.proposals.expiration_interval > config.proposals.lifetime {
        warnings.push_with_hint(
            "Expiration sweep runs less often than proposals expire; stale proposals stay visible for longer",
            "Set EXPIRATION_JOB_DELAY below PROPOSAL_LIFETIME",
        );
    }

    if config.quality.update_interval < MIN_QUALITY_INTERVAL {
        warnings.push_with_hint(
            "Quality refresh interval is below one minute",
            "The quality oracle serves slowly changing data; consider QUALITY_UPDATE_INTERVAL=30m",
        );
    }

    if config.quality.request_timeout >= config.quality.update_interval {
        warnings.push(
            "Quality request timeout is not shorter than the refresh interval",
        );
    }

    Ok(warnings)
}

fn validate_url(
    field: &'static str,
    value: &str,
    schemes: &[&str],
    expected: &'static str,
) -> Result<(), ConfigGuardRailError> {
    let parsed =
        Url::parse(value).map_err(|source| ConfigGuardRailError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        })?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            field,
            scheme: parsed.scheme().to_string(),
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_without_warnings() {
        let warnings =
            apply_guard_rails(&Config::default()).expect("defaults are valid");
        assert!(warnings.is_empty());
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = Config::default();
        config.rate_limit.window = Duration::ZERO;
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::ZeroDuration {
                field: "rate_limit.window"
            })
        ));
    }

    #[test]
    fn oracle_needs_http_scheme() {
        let mut config = Config::default();
        config.quality.oracle_url = "ftp://quality.example.net".into();
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::UnsupportedScheme { .. })
        ));

        config.quality.oracle_url = "quality.example.net".into();
        assert!(matches!(
            apply_guard_rails(&config),
            Err(ConfigGuardRailError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn slow_sweep_and_fast_refresh_warn() {
        let mut config = Config::default();
        config.proposals.expiration_interval = Duration::from_secs(600);
        config.quality.update_interval = Duration::from_secs(45);
        config.quality.request_timeout = Duration::from_secs(10);

        let warnings = apply_guard_rails(&config).expect("only warnings");
        assert_eq!(warnings.len(), 2);
    }
}
