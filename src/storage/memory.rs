//! In-Memory Block Store
//!
//! Holds blobs in a concurrent map and lets tests knock the node offline
//! or corrupt individual blobs, standing in for failed disks and
//! unreachable nodes.

use crate::error::{Error, Result};
use crate::storage::{validate_blob_name, BlockStore};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory node with failure injection.
pub struct MemoryStore {
    node_index: usize,
    blobs: DashMap<String, Bytes>,
    online: AtomicBool,
}

impl MemoryStore {
    /// Create an online node identified by `node_index` in diagnostics.
    pub fn new(node_index: usize) -> Self {
        Self {
            node_index,
            blobs: DashMap::new(),
            online: AtomicBool::new(true),
        }
    }

    /// Bring the node online or take it offline. An offline node fails
    /// every operation and the liveness probe.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Replace a stored blob with arbitrary bytes, simulating corruption
    /// that manifests as a length mismatch on retrieval.
    pub fn corrupt(&self, name: &str, data: Bytes) {
        self.blobs.insert(name.to_string(), data);
    }

    /// Drop a single blob, simulating loss without taking the node down.
    pub fn drop_blob(&self, name: &str) {
        self.blobs.remove(name);
    }

    /// Number of blobs currently stored.
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    fn check_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NodeOffline {
                node_index: self.node_index,
                addr: format!("memory:{}", self.node_index),
            })
        }
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        self.check_online()?;
        validate_blob_name(name)?;
        self.blobs.insert(name.to_string(), data);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        self.check_online()?;
        validate_blob_name(name)?;
        Ok(self.blobs.get(name).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.check_online()?;
        validate_blob_name(name)?;
        self.blobs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::BlobNotFound {
                name: name.to_string(),
            })
    }

    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_roundtrip() {
        let store = MemoryStore::new(0);

        store.put("blob", Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(
            store.get("blob").await.unwrap().unwrap(),
            Bytes::from_static(b"abc")
        );
        assert_eq!(store.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let store = MemoryStore::new(3);
        store.put("blob", Bytes::from_static(b"x")).await.unwrap();

        store.set_online(false);
        assert!(!store.is_online().await);
        assert_matches!(
            store.get("blob").await,
            Err(Error::NodeOffline { node_index: 3, .. })
        );
        assert!(store.put("other", Bytes::new()).await.is_err());

        // Blobs survive an outage
        store.set_online(true);
        assert!(store.get("blob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_and_drop() {
        let store = MemoryStore::new(0);
        store.put("blob", Bytes::from_static(b"full")).await.unwrap();

        store.corrupt("blob", Bytes::from_static(b"f"));
        assert_eq!(store.get("blob").await.unwrap().unwrap().len(), 1);

        store.drop_blob("blob");
        assert!(store.get("blob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let store = MemoryStore::new(0);
        assert_matches!(
            store.delete("absent").await,
            Err(Error::BlobNotFound { .. })
        );
    }
}
