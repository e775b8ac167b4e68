//! Router configuration for the web server.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(handlers::search))
        // Per-marketplace collectors: ebay, ali, aliexpress, amazon
        .route(
            "/api/:marketplace/item_summary/search",
            get(handlers::marketplace_search),
        )
        .route("/api/parse-url", get(handlers::parse_url))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
