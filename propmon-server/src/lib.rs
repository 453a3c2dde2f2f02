//! # Propmon Server
//!
//! HTTP surface and process wiring for the proposal monitor: the read API
//! over the proposal store, the Prometheus scrape endpoint, and the bus
//! listener feeding the store.

pub mod broker;
pub mod handlers;
pub mod infra;
pub mod routes;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub use infra::app_state::AppState;

use handlers::{health::health_handler, metrics::metrics_handler};

/// Builds the full application router.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// admission control can see peer addresses.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(routes::create_api_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
