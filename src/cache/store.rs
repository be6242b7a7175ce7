//! Cache Store Module
//!
//! Orchestrates reads, writes and listing on top of the storage adapter,
//! applying the entry codec, expiry checks and (in cache mode) the
//! cache-aside fill from the upstream.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::value::RawValue;
use tracing::{debug, warn};

use crate::cache::entry::{self, Decoded, Ttl};
use crate::cache::{CacheStats, Clock, StatsSnapshot, SystemClock};
use crate::error::{CacheError, Result};
use crate::models::{is_delete_marker, DataMap, Notification};
use crate::notify::NotificationBus;
use crate::storage::{SharedStorage, WriteBatch, SCAN_PAGE_SIZE};
use crate::upstream::Upstream;

// == Mode ==
/// Role of this node.
#[derive(Clone)]
pub enum Mode {
    /// Local storage is the source of truth; misses are final
    Authority,
    /// Misses are filled from the upstream and cached locally
    Cache(Arc<dyn Upstream>),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Authority => "authority",
            Mode::Cache(_) => "cache",
        }
    }
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Authority => f.write_str("Authority"),
            Mode::Cache(upstream) => f.debug_tuple("Cache").field(&upstream.location()).finish(),
        }
    }
}

// == Cache Store ==
/// Request-level operations over a storage adapter.
///
/// Shared behind an `Arc` by both transports and the janitor; all state is
/// either immutable or internally synchronized.
pub struct CacheStore {
    storage: SharedStorage,
    mode: Mode,
    ttl: Ttl,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
    bus: Option<Arc<NotificationBus>>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store reading the system clock, without notifications.
    ///
    /// # Arguments
    /// * `storage` - Adapter holding the encoded entries
    /// * `mode` - Authority, or cache in front of an upstream
    /// * `ttl` - Lifetime given to every write; `Ttl::INFINITE` disables expiry
    pub fn new(storage: SharedStorage, mode: Mode, ttl: Ttl) -> Self {
        Self {
            storage,
            mode,
            ttl,
            clock: Arc::new(SystemClock),
            stats: CacheStats::new(),
            bus: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publishes every change (UPDATE and cache fill) to `bus`.
    pub fn with_notifications(mut self, bus: Arc<NotificationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    // == Get ==
    /// Resolves each distinct key to its value or `None`.
    ///
    /// Duplicate keys are looked up once. In cache mode a miss consults the
    /// upstream; an upstream failure fails the whole call, but fills made
    /// for earlier keys stay stored.
    pub async fn get_many(&self, keys: &[String]) -> Result<DataMap> {
        let mut data = DataMap::new();
        for key in keys {
            if data.contains_key(key) {
                continue;
            }
            let value = self.get_one(key).await?;
            data.insert(key.clone(), value);
        }
        Ok(data)
    }

    async fn get_one(&self, key: &str) -> Result<Option<Box<RawValue>>> {
        let now = self.clock.now_nanos();
        if let Some(value) = self.read_local(key, now).await? {
            self.stats.record_hit();
            return Ok(Some(value));
        }
        self.stats.record_miss();

        let Mode::Cache(upstream) = &self.mode else {
            return Ok(None);
        };

        self.stats.record_upstream_fetch();
        let fetched = match upstream.fetch(key).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.stats.record_upstream_error();
                warn!(key, upstream = upstream.location(), error = %e, "upstream fetch failed");
                return Err(e.into());
            }
        };

        let Some(value) = fetched else {
            debug!(key, "upstream miss");
            return Ok(None);
        };

        self.populate(key, &value).await?;
        Ok(Some(value))
    }

    /// Local lookup. Expired entries are deleted, malformed ones skipped.
    async fn read_local(&self, key: &str, now: i64) -> Result<Option<Box<RawValue>>> {
        let Some(bytes) = self.storage.get(key.as_bytes().to_vec()).await? else {
            return Ok(None);
        };

        match entry::decode(&bytes) {
            Ok(Decoded::Entry(entry)) if entry.is_expired_at(now) => {
                self.stats.record_expired();
                debug!(key, "entry expired on read");
                // A write that landed after our read keeps its newer bytes.
                let mut batch = WriteBatch::new();
                batch.delete_if_eq(key.as_bytes(), bytes);
                if let Err(e) = self.storage.write(batch).await {
                    warn!(key, error = %e, "failed to delete expired entry");
                }
                Ok(None)
            }
            Ok(Decoded::Entry(entry)) => Ok(Some(entry.value)),
            Ok(Decoded::Legacy(value)) => {
                if let Mode::Cache(_) = self.mode {
                    self.rewrite_legacy(key, &bytes, &value, now).await;
                }
                Ok(Some(value))
            }
            Err(e) => {
                warn!(key, error = %e, "skipping malformed entry");
                Ok(None)
            }
        }
    }

    /// Wraps an unwrapped value so it starts expiring like any other fill.
    ///
    /// `current` is the legacy bytes as read; the rewrite is skipped if the
    /// key has changed since.
    async fn rewrite_legacy(&self, key: &str, current: &[u8], value: &RawValue, now: i64) {
        let result = match entry::encode(value, self.ttl, now) {
            Ok(wrapped) => {
                let mut batch = WriteBatch::new();
                batch.put_if_eq(key.as_bytes(), current, wrapped);
                self.storage.write(batch).await.map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(()) => debug!(key, "rewrote legacy entry with expiry"),
            Err(e) => warn!(key, error = %e, "failed to rewrite legacy entry"),
        }
    }

    /// Stores an upstream value locally and announces it.
    async fn populate(&self, key: &str, value: &RawValue) -> Result<()> {
        let bytes = entry::encode(value, self.ttl, self.clock.now_nanos())
            .map_err(|e| CacheError::Internal(e.to_string()))?;
        self.storage.put(key.as_bytes().to_vec(), bytes).await?;
        self.stats.record_writes(1);
        debug!(key, "populated from upstream");

        self.publish(key, Some(value.to_owned())).await;
        Ok(())
    }

    // == Update ==
    /// Applies every item in one batch; `""` or `null` deletes the key.
    ///
    /// Notifications go out only after the batch is stored.
    pub async fn update(&self, items: BTreeMap<String, Box<RawValue>>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let now = self.clock.now_nanos();
        let mut batch = WriteBatch::new();
        let mut changes = Vec::with_capacity(items.len());
        let (mut writes, mut deletes) = (0u64, 0u64);

        for (key, value) in items {
            if is_delete_marker(&value) {
                batch.delete(key.as_bytes());
                deletes += 1;
                changes.push((key, None));
            } else {
                let bytes = entry::encode(&value, self.ttl, now)
                    .map_err(|e| CacheError::Internal(e.to_string()))?;
                batch.put(key.as_bytes(), bytes);
                writes += 1;
                changes.push((key, Some(value)));
            }
        }

        self.storage.write(batch).await?;
        self.stats.record_writes(writes);
        self.stats.record_deletes(deletes);
        debug!(writes, deletes, "update applied");

        for (key, value) in changes {
            self.publish(&key, value).await;
        }
        Ok(())
    }

    // == List ==
    /// Returns every live entry currently in local storage.
    ///
    /// Never consults the upstream. Legacy entries are included only in
    /// authority mode, where they are the node's own data.
    pub async fn list(&self) -> Result<DataMap> {
        let now = self.clock.now_nanos();
        let mut data = DataMap::new();
        let mut cursor: Option<Vec<u8>> = None;

        loop {
            let page = self.storage.scan(cursor.take(), SCAN_PAGE_SIZE).await?;
            let exhausted = page.len() < SCAN_PAGE_SIZE;
            let next = page.last().map(|(key, _)| key.clone());

            for (key, bytes) in page {
                let Ok(key) = String::from_utf8(key) else {
                    warn!("skipping non-UTF-8 key");
                    continue;
                };
                match entry::decode(&bytes) {
                    Ok(Decoded::Entry(entry)) if !entry.is_expired_at(now) => {
                        data.insert(key, Some(entry.value));
                    }
                    Ok(Decoded::Entry(_)) => {}
                    Ok(Decoded::Legacy(value)) => {
                        if let Mode::Authority = self.mode {
                            data.insert(key, Some(value));
                        }
                    }
                    Err(e) => warn!(key = %key, error = %e, "skipping malformed entry"),
                }
            }

            match next {
                Some(next) if !exhausted => cursor = Some(next),
                _ => break,
            }
        }

        Ok(data)
    }

    async fn publish(&self, key: &str, value: Option<Box<RawValue>>) {
        if let Some(bus) = &self.bus {
            bus.broadcast(&Notification::new(key, value)).await;
        }
    }

    // == Accessors ==
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Live counters, for callers that record their own events.
    pub fn counters(&self) -> &CacheStats {
        &self.stats
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("mode", &self.mode)
            .field("ttl", &self.ttl)
            .field("notifications", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}
