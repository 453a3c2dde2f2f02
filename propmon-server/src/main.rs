use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use propmon_config::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, ConfigOverrides,
};
use propmon_core::{FixedWindowLimiter, Ingestor, MetricsSink, ProposalStore};
use propmon_server::{
    AppState,
    broker::{BrokerListener, connect_with_retry},
    create_app,
    infra::{metrics::PrometheusMetrics, services::BackgroundServices},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "propmon")]
#[command(
    about = "Tracks live service proposals from the broker and serves them over HTTP"
)]
struct Cli {
    /// Path to a propmon.toml file
    #[arg(short, long, env = "PROPMON_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file (defaults to ./.env when present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Skip loading any .env file
    #[arg(long, default_value_t = false)]
    no_env_file: bool,

    /// Broker URL (overrides config)
    #[arg(long, env = "BROKER_ADDRESS")]
    broker_address: Option<String>,

    /// Address serving the API and metrics (overrides config)
    #[arg(long, alias = "metrics-address", env = "METRICS_ADDRESS")]
    bind: Option<String>,

    /// How long a proposal lives without a ping, e.g. "3m 10s"
    #[arg(long, env = "PROPOSAL_LIFETIME", value_parser = humantime::parse_duration)]
    proposal_lifetime: Option<Duration>,

    /// Pause between expiration sweeps
    #[arg(
        long,
        alias = "expiration-job-delay",
        env = "EXPIRATION_JOB_DELAY",
        value_parser = humantime::parse_duration
    )]
    expiration_interval: Option<Duration>,

    /// Quality oracle base URL
    #[arg(long, env = "QUALITY_ORACLE")]
    quality_oracle: Option<String>,

    /// Pause between quality refreshes
    #[arg(long, env = "QUALITY_UPDATE_INTERVAL", value_parser = humantime::parse_duration)]
    quality_update_interval: Option<Duration>,
}

impl Cli {
    fn loader(&self) -> ConfigLoader {
        ConfigLoader::with_options(ConfigLoaderOptions {
            config_path: self.config.clone(),
            env_file: self.env_file.clone(),
            skip_env_file: self.no_env_file,
        })
        .with_overrides(ConfigOverrides {
            broker_address: self.broker_address.clone(),
            bind_address: self.bind.clone(),
            proposal_lifetime: self.proposal_lifetime,
            expiration_interval: self.expiration_interval,
            quality_oracle: self.quality_oracle.clone(),
            quality_update_interval: self.quality_update_interval,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ConfigLoad { config, warnings } = cli
        .loader()
        .load()
        .context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "loaded configuration file");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    let store = Arc::new(ProposalStore::new(config.proposals.lifetime));
    let metrics = Arc::new(
        PrometheusMetrics::new().context("failed to register metrics")?,
    );
    let sink: Arc<dyn MetricsSink> = metrics.clone();

    let services =
        BackgroundServices::from_config(&config, Arc::clone(&store), Arc::clone(&sink))
            .context("failed to build quality oracle client")?;

    let client = connect_with_retry(&config.broker)
        .await
        .context("failed to connect to broker")?;
    let listener = BrokerListener::start(
        client,
        Ingestor::new(Arc::clone(&store), Arc::clone(&sink)),
    )
    .await
    .context("failed to subscribe to proposal subjects")?;

    services.start();

    let limiter = FixedWindowLimiter::spawn(
        config.rate_limit.max_requests,
        config.rate_limit.window,
    );
    let state = AppState::new(
        Arc::clone(&store),
        metrics,
        limiter,
        config.security.trust_proxy_headers,
    );
    let app = create_app(state);

    let bind = config.server.bind_address;
    let tcp = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(address = %bind, "serving API and metrics");

    let served = axum::serve(
        tcp,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    listener.shutdown().await;
    services.stop().await;
    info!(remaining = store.count_proposals(), "shutdown complete");

    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
