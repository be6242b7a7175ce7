//! API Module
//!
//! HTTP transport for the request envelope, plus operational endpoints.
//!
//! # Endpoints
//! - `POST /` - Request envelope
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
