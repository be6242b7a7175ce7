//! Error types for the key-value front-end
//!
//! Provides unified error handling using thiserror. Each layer owns its
//! own enum; `CacheError` is what a request ultimately fails with.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

// == Storage Error ==
/// Failure reported by a storage adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying engine rejected or failed the operation
    #[error("storage engine error: {0}")]
    Engine(String),

    /// A blocking storage task could not be joined
    #[error("storage task failed: {0}")]
    Join(String),
}

// == Decode Error ==
/// A stored entry could not be decoded.
///
/// Never surfaced to clients; the entry is treated as absent.
#[derive(Error, Debug)]
#[error("malformed entry: {0}")]
pub struct DecodeError(#[from] pub serde_json::Error);

// == Upstream Error ==
/// Failure while fetching a key from the upstream authority.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Network failure or timeout
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status other than not-found
    #[error("upstream status {0}")]
    Status(u16),

    /// The upstream answered with an ERR envelope
    #[error("upstream error: {0}")]
    Remote(String),

    /// The upstream body was not a valid response envelope
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

// == Frame Error ==
/// Failure reading or writing a length-prefixed frame.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Underlying socket I/O failed (including EOF mid-frame)
    #[error("frame i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Declared or actual payload length over the frame limit
    #[error("frame of {0} bytes exceeds limit")]
    TooLarge(usize),
}

impl FrameError {
    /// True when the peer closed the connection between frames.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, FrameError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

// == Config Error ==
/// Invalid value in the process environment.
#[derive(Error, Debug)]
#[error("invalid {name}: {reason}")]
pub struct ConfigError {
    pub name: &'static str,
    pub reason: String,
}

// == Cache Error Enum ==
/// Unified error type for request handling.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed envelope or invalid request data
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request type not understood by the dispatcher
    #[error("unknown type")]
    UnknownType,

    /// Storage adapter failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Upstream fetch failure; fails the whole GET
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handling.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type returned by storage adapters.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
