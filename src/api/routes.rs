//! Route table for the wire protocol.

use axum::routing::{get, post};
use axum::Router;

use crate::api::handlers;
use crate::api::state::AppState;

/// Build the router for the four wire-protocol verbs plus the ambient
/// health/metrics endpoints.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/write", post(handlers::write))
        .route("/read", get(handlers::read))
        .route("/listChunks", get(handlers::list_chunks))
        .route("/ack", get(handlers::ack))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
}
