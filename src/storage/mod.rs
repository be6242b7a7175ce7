//! Storage Module
//!
//! The persistent key-value engine behind the cache, expressed as a trait so
//! the orchestration layer never depends on a concrete engine.
//!
//! Adapters:
//! - [`MemoryStorage`] - ordered in-process map, contents lost on exit
//! - [`RedbStorage`] - embedded redb database with ACID write transactions
//!
//! Adapters are blocking. Async callers go through [`SharedStorage`], which
//! moves each call onto the blocking thread pool.

mod async_ops;
mod memory;
mod redb_store;

pub use async_ops::SharedStorage;
pub use memory::MemoryStorage;
pub use redb_store::RedbStorage;

use crate::error::StorageResult;

/// A stored key and its raw bytes.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Entries fetched per `scan` call by full-keyspace walks.
pub const SCAN_PAGE_SIZE: usize = 1024;

// == Storage Trait ==
/// Get/put/delete/range-scan primitives plus batched writes.
///
/// Implementations provide their own per-key atomicity and must be safe for
/// concurrent readers and writers.
pub trait Storage: Send + Sync + 'static {
    /// Returns the raw bytes stored under `key`.
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Applies every operation in `batch`, in order.
    fn write(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Returns up to `limit` entries in ascending key order, starting
    /// strictly after `after` (or from the first key when `None`).
    fn scan(&self, after: Option<&[u8]>, limit: usize) -> StorageResult<Vec<KeyValue>>;
}

// == Write Batch ==
/// A single operation inside a [`WriteBatch`].
///
/// The `IfEq` variants apply only when the stored bytes still equal
/// `expected` at the moment the batch is applied, and are skipped otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    PutIfEq {
        key: Vec<u8>,
        expected: Vec<u8>,
        value: Vec<u8>,
    },
    DeleteIfEq { key: Vec<u8>, expected: Vec<u8> },
}

/// An ordered group of writes applied with one `Storage::write` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// Replaces `key` only if it still holds `expected`.
    pub fn put_if_eq(
        &mut self,
        key: impl Into<Vec<u8>>,
        expected: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) {
        self.ops.push(BatchOp::PutIfEq {
            key: key.into(),
            expected: expected.into(),
            value: value.into(),
        });
    }

    /// Removes `key` only if it still holds `expected`.
    pub fn delete_if_eq(&mut self, key: impl Into<Vec<u8>>, expected: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::DeleteIfEq {
            key: key.into(),
            expected: expected.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Takes the accumulated operations, leaving the batch empty.
    pub fn take(&mut self) -> WriteBatch {
        std::mem::take(self)
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
