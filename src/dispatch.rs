//! Request Dispatcher
//!
//! Validates a decoded request envelope and routes it to the cache store.
//! Shared by the socket and HTTP transports.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};
use crate::models::{Request, RequestType, Response};

/// Message returned when SUBSCRIBE arrives where it cannot be honored.
pub const SUBSCRIBE_UNSUPPORTED: &str = "SUBSCRIBE requires a socket connection";

#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<CacheStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Handles `request`, turning any failure into an ERR envelope.
    pub async fn serve(&self, request: Request) -> Response {
        let kind = request.kind;
        match self.handle(request).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    CacheError::Storage(_) | CacheError::Internal(_) => {
                        warn!(?kind, error = %e, "request failed")
                    }
                    _ => debug!(?kind, error = %e, "request rejected"),
                }
                Response::error(e.to_string())
            }
        }
    }

    /// Handles `request`, returning the failure as a typed error.
    ///
    /// SUBSCRIBE is answered here only with an error; transports that can
    /// hold a connection open intercept it before dispatch.
    pub async fn handle(&self, request: Request) -> Result<Response> {
        if let Some(reason) = request.validate() {
            return Err(CacheError::InvalidRequest(reason));
        }

        match request.kind {
            RequestType::Get => Ok(Response::with_data(
                self.store.get_many(&request.keys).await?,
            )),
            RequestType::List => Ok(Response::with_data(self.store.list().await?)),
            RequestType::Update => {
                self.store.update(request.items).await?;
                Ok(Response::ok())
            }
            RequestType::Subscribe => {
                Err(CacheError::InvalidRequest(SUBSCRIBE_UNSUPPORTED.to_string()))
            }
            RequestType::Unknown => Err(CacheError::UnknownType),
        }
    }
}
