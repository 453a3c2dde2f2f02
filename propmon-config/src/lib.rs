//! Configuration for the propmon service.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! environment variables (with `.env` support), then command line
//! overrides. Durations use `humantime` syntax such as `3m 10s`.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
    ConfigOverrides,
};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    BrokerConfig, Config, ConfigMetadata, ProposalConfig, QualityConfig,
    RateLimitConfig, SecurityConfig, ServerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
