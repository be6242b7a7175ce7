//! API Handlers
//!
//! HTTP request handlers. The envelope endpoint speaks the same JSON
//! protocol as the socket; the others are operational read-outs.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};

use crate::cache::CacheStore;
use crate::dispatch::Dispatcher;
use crate::error::{CacheError, Result};
use crate::models::{HealthResponse, Request, Response, StatsResponse};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.dispatcher.store()
    }
}

/// Handler for POST /
///
/// Decodes a request envelope and dispatches it. A body that does not decode
/// and an ERR outcome both answer 400 with the message as plain text; an OK
/// outcome answers 200 with the JSON envelope.
pub async fn envelope_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Response>> {
    let request: Request =
        serde_json::from_slice(&body).map_err(|e| CacheError::InvalidRequest(e.to_string()))?;

    let response = state.dispatcher.handle(request).await?;
    Ok(Json(response))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.store();
    Json(StatsResponse::new(
        store.mode().name(),
        store.ttl().to_string(),
        store.stats(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
