//! In-memory storage backend, used when no database is configured and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{StorageError, StorageInterface};

/// Documents per collection, each tagged with the sequence number of its first
/// insertion so listings come back oldest first.
#[derive(Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, (u64, Vec<u8>)>>,
    next_seq: u64,
}

pub struct MemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Inner::default())) }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageInterface for MemoryStorage {
    async fn get_bytes(&self, collection: &str, id: &str) -> Result<Vec<u8>, StorageError> {
        let inner = self.inner.read().await;
        inner.collections.get(collection)
            .and_then(|docs| docs.get(id))
            .map(|(_, bytes)| bytes.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn set_bytes(&self, collection: &str, id: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let docs = inner.collections.entry(collection.to_string()).or_default();
        if let Some(entry) = docs.get_mut(id) {
            entry.1 = value;
        } else {
            docs.insert(id.to_string(), (inner.next_seq, value));
            inner.next_seq += 1;
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let mut inner = self.inner.write().await;
        Ok(inner.collections.get_mut(collection).is_some_and(|docs| docs.remove(id).is_some()))
    }

    async fn exists(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.collections.get(collection).is_some_and(|docs| docs.contains_key(id)))
    }

    async fn list_bytes(&self, collection: &str) -> Result<Vec<Vec<u8>>, StorageError> {
        let inner = self.inner.read().await;
        let Some(docs) = inner.collections.get(collection) else { return Ok(vec![]) };
        let mut entries: Vec<&(u64, Vec<u8>)> = docs.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, bytes)| bytes.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overwrite_keeps_position() {
        let storage = MemoryStorage::new();
        storage.set_bytes("c", "1", b"one".to_vec()).await.unwrap();
        storage.set_bytes("c", "2", b"two".to_vec()).await.unwrap();
        storage.set_bytes("c", "1", b"uno".to_vec()).await.unwrap();
        assert_eq!(storage.list_bytes("c").await.unwrap(), vec![b"uno".to_vec(), b"two".to_vec()]);
        assert!(storage.delete("c", "1").await.unwrap());
        assert!(!storage.delete("c", "1").await.unwrap());
        assert!(matches!(storage.get_bytes("c", "1").await, Err(StorageError::NotFound)));
        assert!(storage.list_bytes("other").await.unwrap().is_empty());
    }
}
