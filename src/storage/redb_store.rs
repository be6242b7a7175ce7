//! redb storage adapter.
//!
//! Keys and values are stored as raw bytes in a single table. Each call runs
//! in its own transaction; `write` commits a whole batch in one transaction.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use super::{BatchOp, KeyValue, Storage, WriteBatch};
use crate::error::{StorageError, StorageResult};

/// Table holding the wrapped entries.
const KV_TABLE: TableDefinition<'static, &'static [u8], &'static [u8]> =
    TableDefinition::new("kv");

/// Storage adapter backed by an embedded redb database file.
///
/// `RedbStorage` is `Clone`; clones share the same database handle.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Opens or creates the database at `path`.
    ///
    /// Creates parent directories if needed and initializes the table so
    /// read transactions never see it missing.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Engine(format!(
                    "failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let db = Database::create(path).map_err(engine)?;

        let write_txn = db.begin_write().map_err(engine)?;
        {
            let _table = write_txn.open_table(KV_TABLE).map_err(engine)?;
        }
        write_txn.commit().map_err(engine)?;

        debug!(path = %path.display(), "opened redb storage");
        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read().map_err(engine)?;
        let table = read_txn.open_table(KV_TABLE).map_err(engine)?;
        let value = table.get(key).map_err(engine)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(batch)
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        let write_txn = self.db.begin_write().map_err(engine)?;
        {
            let mut table = write_txn.open_table(KV_TABLE).map_err(engine)?;
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put { key, value } => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(engine)?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(key.as_slice()).map_err(engine)?;
                    }
                    BatchOp::PutIfEq {
                        key,
                        expected,
                        value,
                    } => {
                        if holds(&table, &key, &expected)? {
                            table
                                .insert(key.as_slice(), value.as_slice())
                                .map_err(engine)?;
                        }
                    }
                    BatchOp::DeleteIfEq { key, expected } => {
                        if holds(&table, &key, &expected)? {
                            table.remove(key.as_slice()).map_err(engine)?;
                        }
                    }
                }
            }
        }
        write_txn.commit().map_err(engine)
    }

    fn scan(&self, after: Option<&[u8]>, limit: usize) -> StorageResult<Vec<KeyValue>> {
        let read_txn = self.db.begin_read().map_err(engine)?;
        let table = read_txn.open_table(KV_TABLE).map_err(engine)?;

        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };

        let mut out = Vec::with_capacity(limit.min(1024));
        for item in table
            .range::<&[u8]>((lower, Bound::Unbounded))
            .map_err(engine)?
            .take(limit)
        {
            let (key, value) = item.map_err(engine)?;
            out.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }
}

/// Whether `key` currently stores exactly `expected`.
fn holds<T>(table: &T, key: &[u8], expected: &[u8]) -> StorageResult<bool>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let current = table.get(key).map_err(engine)?;
    Ok(current.is_some_and(|guard| guard.value() == expected))
}

fn engine<E: Into<redb::Error>>(err: E) -> StorageError {
    StorageError::Engine(err.into().to_string())
}
