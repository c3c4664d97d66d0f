//! HTTP surface for the Lumen media catalog.

pub mod handlers;
pub mod infra;
pub mod routes;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub use infra::app_state::AppState;

/// Build the complete application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health::health))
        .nest("/api", routes::create_api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
