//! API Routes
//!
//! Configures the Axum router for the HTTP transport.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{envelope_handler, health_handler, stats_handler, AppState};
use crate::transport::MAX_FRAME_LEN;

/// Creates the router.
///
/// # Endpoints
/// - `POST /` - Request envelope (GET, LIST, UPDATE)
/// - `GET /stats` - Mode, TTL and counters
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Body limit: same as the socket frame limit
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(envelope_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_FRAME_LEN))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
