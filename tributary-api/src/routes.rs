//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        // Health check
        .route("/health", get(handlers::health_check))
        // Single resources
        .route("/api/weather", get(handlers::get_weather))
        .route("/api/news", get(handlers::get_news))
        .route("/api/stocks", get(handlers::get_stocks))
        // All three
        .route("/api/aggregate", get(handlers::get_aggregate))
        .route("/api/stats", get(handlers::get_stats))
        .with_state(state)
}
