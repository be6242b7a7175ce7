//! Notification Bus
//!
//! Pushes a `NOTIFY` frame to every subscribed socket connection whenever a
//! key changes. A subscriber whose write fails or stalls is dropped without
//! affecting the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::Notification;
use crate::transport::frame::write_frame;

/// Identifier handed out on registration.
pub type ClientId = u64;

type Subscriber = Box<dyn AsyncWrite + Send + Unpin>;

/// Per-subscriber write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Registry of subscribed connections.
pub struct NotificationBus {
    clients: Mutex<HashMap<ClientId, Subscriber>>,
    next_id: AtomicU64,
    write_timeout: Duration,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }

    pub fn with_write_timeout(write_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            write_timeout,
        }
    }

    /// Takes ownership of a connection's write half.
    pub async fn register<W>(&self, writer: W) -> ClientId
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().await.insert(id, Box::new(writer));
        info!(client = id, "subscriber registered");
        id
    }

    /// Removes a subscriber; false if it was already gone.
    pub async fn deregister(&self, id: ClientId) -> bool {
        let removed = self.clients.lock().await.remove(&id).is_some();
        if removed {
            info!(client = id, "subscriber deregistered");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Broadcast ==
    /// Sends `note` to every subscriber and returns how many received it.
    ///
    /// Delivery is best effort: there is no retry and no queue for slow
    /// readers.
    pub async fn broadcast(&self, note: &Notification) -> usize {
        let payload = match serde_json::to_vec(note) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %note.key, error = %e, "failed to encode notification");
                return 0;
            }
        };

        let mut clients = self.clients.lock().await;
        let mut failed = Vec::new();
        let mut delivered = 0;

        for (id, writer) in clients.iter_mut() {
            match tokio::time::timeout(self.write_timeout, write_frame(writer, &payload)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    debug!(client = *id, error = %e, "notification write failed");
                    failed.push(*id);
                }
                Err(_) => {
                    debug!(client = *id, "notification write timed out");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            clients.remove(&id);
            info!(client = id, "dropped unreachable subscriber");
        }

        delivered
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}
