//! Per-client admission control for the query API.

use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use propmon_core::Admission;
use tracing::debug;

use crate::infra::{app_state::AppState, errors::AppError};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Counts the request against the caller's window and rejects it with
/// `429 Too Many Requests` once the window's budget is spent.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(req.headers(), peer, state.trust_proxy_headers);

    match state.limiter.check(&client) {
        Admission::Allowed { .. } => next.run(req).await,
        Admission::Rejected { count, retry_after } => {
            debug!(client = %client, count, "rate limit exceeded");
            let mut response =
                AppError::rate_limited("Too many requests").into_response();
            response
                .headers_mut()
                .insert(RETRY_AFTER, retry_after_header(retry_after));
            response
        }
    }
}

/// Identifies the caller: the first `X-Forwarded-For` hop when proxy
/// headers are trusted, otherwise the peer IP.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers
        && let Some(forwarded) = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    {
        return forwarded.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn retry_after_header(retry_after: Duration) -> HeaderValue {
    let mut secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs += 1;
    }
    HeaderValue::from(secs.max(1))
}
