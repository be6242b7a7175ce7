//! Upstream Client
//!
//! Fetches a single key from the peer authority this node caches for. The
//! peer speaks the same HTTP envelope protocol as this node's own API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::value::RawValue;
use tracing::debug;

use crate::error::UpstreamError;
use crate::models::{Request, Response, ResponseType};

/// Source of truth consulted on a local miss.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Fetches `key`. `Ok(None)` is a legitimate miss, not an error.
    async fn fetch(&self, key: &str) -> Result<Option<Box<RawValue>>, UpstreamError>;

    /// Human-readable location, used in logs.
    fn location(&self) -> &str;
}

// == HTTP Upstream ==
/// Upstream reached with `POST <url>` carrying a GET envelope.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    url: String,
    client: reqwest::Client,
}

impl HttpUpstream {
    /// Creates a client whose every call fails after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, key: &str) -> Result<Option<Box<RawValue>>, UpstreamError> {
        debug!(key, upstream = %self.url, "fetching from upstream");

        let response = self
            .client
            .post(&self.url)
            .json(&Request::get([key]))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let envelope: Response = serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        if envelope.kind == ResponseType::Err {
            return Err(UpstreamError::Remote(envelope.error.unwrap_or_default()));
        }

        Ok(envelope
            .data
            .and_then(|mut data| data.remove(key))
            .flatten())
    }

    fn location(&self) -> &str {
        &self.url
    }
}
