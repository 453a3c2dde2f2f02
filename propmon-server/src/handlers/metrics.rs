use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};

use crate::infra::{app_state::AppState, errors::AppResult};

/// Prometheus text exposition of the private registry.
pub async fn metrics_handler(
    State(state): State<AppState>,
) -> AppResult<Response> {
    let body = state.metrics.encode()?;
    Ok(([(CONTENT_TYPE, state.metrics.content_type())], body).into_response())
}
