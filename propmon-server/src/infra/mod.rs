pub mod app_state;
pub mod errors;
pub mod metrics;
pub mod middleware;
pub mod services;
