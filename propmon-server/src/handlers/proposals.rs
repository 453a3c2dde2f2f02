use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use propmon_core::{Proposal, ProposalFilter, Provider};
use serde::Deserialize;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const MAX_RESULTS_CEILING: usize = 1000;

/// Query string of `GET /api/v1/proposals`.
///
/// `max` stays a string so a malformed value falls back to the default
/// instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ProposalQuery {
    pub id: Option<String>,
    pub service: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub ip_type: Option<String>,
    pub max: Option<String>,
}

impl ProposalQuery {
    pub fn filter(&self) -> ProposalFilter {
        ProposalFilter {
            provider_id: self.id.clone(),
            service_type: self.service.clone(),
            country: self.country.clone(),
            ip_type: self.ip_type.clone(),
        }
    }

    /// Result cap: defaults when absent or unparsable, negatives read as
    /// zero, and the ceiling bounds everything else.
    pub fn max_results(&self) -> usize {
        match self.max.as_deref().map(str::trim).map(str::parse::<i64>) {
            Some(Ok(requested)) => {
                requested.clamp(0, MAX_RESULTS_CEILING as i64) as usize
            }
            _ => DEFAULT_MAX_RESULTS,
        }
    }
}

pub async fn list_proposals(
    State(state): State<AppState>,
    Query(query): Query<ProposalQuery>,
) -> AppResult<Json<Vec<Arc<Proposal>>>> {
    let proposals = state.store.matching(&query.filter(), query.max_results());
    if proposals.is_empty() {
        return Err(AppError::not_found("No matching proposals"));
    }
    Ok(Json(proposals))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProviderQuery {
    pub country: Option<String>,
}

pub async fn list_providers(
    State(state): State<AppState>,
    Query(query): Query<ProviderQuery>,
) -> AppResult<Json<Vec<Provider>>> {
    let mut providers = state.store.providers();
    if let Some(country) = query.country.as_deref().filter(|c| !c.is_empty()) {
        providers.retain(|provider| provider.location.country == country);
    }

    if providers.is_empty() {
        return Err(AppError::not_found("No matching providers"));
    }
    providers.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(providers))
}

pub async fn list_countries(
    State(state): State<AppState>,
) -> Json<Vec<String>> {
    Json(state.store.countries())
}
