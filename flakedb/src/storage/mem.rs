//! In-memory storage backend.
//!
//! Keeps all blobs in a `HashMap` behind an async `RwLock`. Useful for unit
//! tests, benchmarks, and single-node in-memory consensus mode. Payloads
//! are treated opaquely; the at-rest encryption contract belongs to the
//! file backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Storage, StorageError};

/// In-memory implementation of [`Storage`].
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_open()?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.check_open()?;
        self.blobs.write().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check_open()?;
        Ok(self.blobs.read().await.contains_key(key))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.check_open()?;
        let mut blobs = self.blobs.write().await;
        match blobs.remove(from) {
            Some(value) => {
                blobs.insert(to.to_string(), value);
                Ok(())
            }
            None => Err(StorageError::NotFound(from.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.check_open()?;
        self.blobs.write().await.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_read_roundtrip_and_explicit_not_found() {
        let store = MemoryStorage::new();
        assert_eq!(store.read("missing").await.unwrap(), None);

        store.write("k", b"value").await.unwrap();
        assert_eq!(store.read("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn rename_moves_and_fails_on_missing_source() {
        let store = MemoryStorage::new();
        store.write("a", b"1").await.unwrap();

        store.rename("a", "b").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
        assert_eq!(store.read("b").await.unwrap(), Some(b"1".to_vec()));

        let err = store.rename("a", "c").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStorage::new();
        store.write("k", b"v").await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_operations() {
        let store = MemoryStorage::new();
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.read("k").await, Err(StorageError::Closed)));
        assert!(matches!(store.write("k", b"v").await, Err(StorageError::Closed)));
    }
}
