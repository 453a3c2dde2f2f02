use std::{collections::HashMap, fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::{error::OracleError, proposal::Quality};

/// Path of the detailed provider endpoint, relative to the oracle base URL.
pub const QUALITY_PATH: &str = "/api/v3/providers/detailed?country=DE";

/// Source of per-proposal quality scores keyed by service key.
#[async_trait]
pub trait QualityOracle: Send + Sync + fmt::Debug {
    async fn fetch(&self) -> Result<HashMap<String, Quality>, OracleError>;
}

#[derive(Debug, Clone)]
pub struct HttpQualityOracle {
    client: Client,
    endpoint: Url,
}

impl HttpQualityOracle {
    pub fn new(
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let endpoint = endpoint_for(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OracleError::Transport)?;
        Ok(Self { client, endpoint })
    }
}

fn endpoint_for(base_url: &str) -> Result<Url, OracleError> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), QUALITY_PATH);
    Url::parse(&raw)
        .map_err(|err| OracleError::InvalidUrl(format!("{base_url}: {err}")))
}

#[async_trait]
impl QualityOracle for HttpQualityOracle {
    async fn fetch(&self) -> Result<HashMap<String, Quality>, OracleError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await?
            .error_for_status()?;

        // Entries the oracle reports as null carry no score.
        let entries: HashMap<String, Option<Quality>> = response.json().await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, quality)| quality.map(|quality| (key, quality)))
            .collect())
    }
}
