use axum::{Router, middleware, routing::get};

use crate::{
    AppState, handlers::proposals, infra::middleware::rate_limit,
};

/// Create all v1 API routes. Every route here is admission-controlled.
pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/proposals", get(proposals::list_proposals))
        .route("/providers", get(proposals::list_providers))
        .route("/countries", get(proposals::list_countries))
        .route_layer(middleware::from_fn_with_state(state, rate_limit))
}
