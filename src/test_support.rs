//! Fixtures shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::value::RawValue;

use crate::cache::{CacheStore, ManualClock, Mode, Ttl};
use crate::error::{StorageResult, UpstreamError};
use crate::storage::{KeyValue, MemoryStorage, SharedStorage, Storage, WriteBatch};
use crate::upstream::Upstream;

/// Start of the manual clock, an arbitrary positive instant.
pub const T0: i64 = 1_700_000_000_000_000_000;

pub fn raw(json: &str) -> Box<RawValue> {
    RawValue::from_string(json.to_string()).unwrap()
}

// == Fake Upstream ==
/// In-memory upstream that counts calls and can be switched to failing.
#[derive(Default)]
pub struct FakeUpstream {
    values: Mutex<HashMap<String, String>>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let upstream = Self::default();
        {
            let mut values = upstream.values.lock();
            for (k, v) in entries {
                values.insert(k.to_string(), v.to_string());
            }
        }
        Arc::new(upstream)
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn fetch(&self, key: &str) -> Result<Option<Box<RawValue>>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock() {
            return Err(UpstreamError::Status(503));
        }
        Ok(self.values.lock().get(key).map(|v| raw(v)))
    }

    fn location(&self) -> &str {
        "fake"
    }
}

// == Counting Storage ==
/// Memory storage that records the size of every batch written.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    batches: Mutex<Vec<usize>>,
}

impl CountingStorage {
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }
}

impl Storage for CountingStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.inner.delete(key)
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        self.batches.lock().push(batch.len());
        self.inner.write(batch)
    }

    fn scan(&self, after: Option<&[u8]>, limit: usize) -> StorageResult<Vec<KeyValue>> {
        self.inner.scan(after, limit)
    }
}

// == Interleaved Storage ==
/// Memory storage that lands one queued `put` just before the next batch is
/// applied, standing in for a client write racing a read-then-write.
#[derive(Default)]
pub struct InterleavedStorage {
    inner: MemoryStorage,
    pending: Mutex<Option<KeyValue>>,
}

impl InterleavedStorage {
    pub fn before_next_write(&self, key: &str, value: Vec<u8>) {
        *self.pending.lock() = Some((key.as_bytes().to_vec(), value));
    }
}

impl Storage for InterleavedStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.inner.delete(key)
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        if let Some((key, value)) = self.pending.lock().take() {
            self.inner.put(&key, &value)?;
        }
        self.inner.write(batch)
    }

    fn scan(&self, after: Option<&[u8]>, limit: usize) -> StorageResult<Vec<KeyValue>> {
        self.inner.scan(after, limit)
    }
}

/// Store over fresh memory storage with a manual clock at `T0`.
pub fn store(mode: Mode, ttl: Ttl) -> (Arc<CacheStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = CacheStore::new(SharedStorage::new(MemoryStorage::new()), mode, ttl)
        .with_clock(clock.clone());
    (Arc::new(store), clock)
}
