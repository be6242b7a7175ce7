//! kv_front - A key-value front-end with cache-aside reads
//!
//! Serves GET, LIST and UPDATE envelopes over a Unix socket and HTTP, backed
//! by an embedded store. As a cache in front of an upstream authority it
//! fills misses from the upstream, stamps entries with a TTL and sweeps them
//! once expired.

pub mod api;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod notify;
pub mod storage;
pub mod tasks;
pub mod transport;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use api::AppState;
pub use cache::{CacheStore, Mode, Ttl};
pub use config::Config;
pub use dispatch::Dispatcher;
pub use notify::NotificationBus;
pub use tasks::spawn_janitor;
