//! Async wrappers for `Storage` operations.
//!
//! Adapters block, so every call is moved onto tokio's blocking pool with
//! `spawn_blocking` to keep request tasks off the engine's I/O.

use std::sync::Arc;

use super::{KeyValue, Storage, WriteBatch};
use crate::error::{StorageError, StorageResult};

/// Cloneable, async handle to a shared storage adapter.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<dyn Storage>,
}

impl SharedStorage {
    pub fn new<S: Storage>(storage: S) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    pub fn from_arc(inner: Arc<dyn Storage>) -> Self {
        Self { inner }
    }

    async fn run<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Storage) -> StorageResult<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(storage.as_ref()))
            .await
            .map_err(|e| StorageError::Join(e.to_string()))?
    }

    /// Async version of `Storage::get`.
    pub async fn get(&self, key: Vec<u8>) -> StorageResult<Option<Vec<u8>>> {
        self.run(move |s| s.get(&key)).await
    }

    /// Async version of `Storage::put`.
    pub async fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.run(move |s| s.put(&key, &value)).await
    }

    /// Async version of `Storage::delete`.
    pub async fn delete(&self, key: Vec<u8>) -> StorageResult<()> {
        self.run(move |s| s.delete(&key)).await
    }

    /// Async version of `Storage::write`.
    pub async fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        self.run(move |s| s.write(batch)).await
    }

    /// Async version of `Storage::scan`.
    pub async fn scan(&self, after: Option<Vec<u8>>, limit: usize) -> StorageResult<Vec<KeyValue>> {
        self.run(move |s| s.scan(after.as_deref(), limit)).await
    }
}

impl std::fmt::Debug for SharedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStorage").finish_non_exhaustive()
    }
}
