//! Request and response envelopes
//!
//! This module defines the wire types shared by the socket transport, the
//! HTTP transport and the upstream client.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{is_delete_marker, Request, RequestType};
pub use responses::{
    DataMap, HealthResponse, Notification, Response, ResponseType, StatsResponse,
};
