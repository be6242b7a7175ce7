//! In-memory storage adapter.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::{BatchOp, KeyValue, Storage, WriteBatch};
use crate::error::StorageResult;

/// Ordered map behind a reader-writer lock.
///
/// Every operation holds the lock for its whole duration, so a batch is
/// applied atomically with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> StorageResult<()> {
        let mut entries = self.entries.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
                BatchOp::PutIfEq {
                    key,
                    expected,
                    value,
                } => {
                    if let Some(current) = entries.get_mut(&key) {
                        if *current == expected {
                            *current = value;
                        }
                    }
                }
                BatchOp::DeleteIfEq { key, expected } => {
                    if entries.get(&key) == Some(&expected) {
                        entries.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn scan(&self, after: Option<&[u8]>, limit: usize) -> StorageResult<Vec<KeyValue>> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let entries = self.entries.read();
        Ok(entries
            .range::<[u8], _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let storage = MemoryStorage::new();
        storage.put(b"k", b"v").unwrap();
        assert_eq!(storage.get(b"k").unwrap(), Some(b"v".to_vec()));

        storage.delete(b"k").unwrap();
        assert_eq!(storage.get(b"k").unwrap(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_delete_absent_key_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.delete(b"missing").is_ok());
    }

    #[test]
    fn test_write_batch_applies_all() {
        let storage = MemoryStorage::new();
        storage.put(b"old", b"x").unwrap();

        let mut batch = WriteBatch::new();
        batch.put("a", "1");
        batch.put("b", "2");
        batch.delete("old");
        storage.write(batch).unwrap();

        assert_eq!(storage.len(), 2);
        assert_eq!(storage.get(b"old").unwrap(), None);
    }

    #[test]
    fn test_conditional_ops_check_current_bytes() {
        let storage = MemoryStorage::new();
        storage.put(b"stale", b"old").unwrap();
        storage.put(b"fresh", b"new").unwrap();

        let mut batch = WriteBatch::new();
        batch.delete_if_eq("stale", "old");
        batch.delete_if_eq("fresh", "old");
        batch.put_if_eq("fresh", "old", "clobbered");
        batch.put_if_eq("absent", "old", "created");
        storage.write(batch).unwrap();

        assert_eq!(storage.get(b"stale").unwrap(), None);
        assert_eq!(storage.get(b"fresh").unwrap(), Some(b"new".to_vec()));
        assert_eq!(storage.get(b"absent").unwrap(), None);

        let mut batch = WriteBatch::new();
        batch.put_if_eq("fresh", "new", "newer");
        storage.write(batch).unwrap();
        assert_eq!(storage.get(b"fresh").unwrap(), Some(b"newer".to_vec()));
    }

    #[test]
    fn test_scan_pages_in_order() {
        let storage = MemoryStorage::new();
        for key in ["d", "a", "c", "b", "e"] {
            storage.put(key.as_bytes(), b"v").unwrap();
        }

        let first = storage.scan(None, 2).unwrap();
        let keys: Vec<_> = first.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"a".as_slice(), b"b".as_slice()]);

        let rest = storage.scan(Some(b"b"), 10).unwrap();
        let keys: Vec<_> = rest.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"c".as_slice(), b"d".as_slice(), b"e".as_slice()]);

        assert!(storage.scan(Some(b"e"), 10).unwrap().is_empty());
    }
}
