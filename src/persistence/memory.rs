//! In-memory blob store, used by tests and by hosts that persist elsewhere.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, ShelterError};

use super::BlobStore;

/// Blob store held in memory.
///
/// Clone is cheap: all clones share the same map, so a test can keep one
/// handle to inspect what the service wrote through another.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, String>>>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicU64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current value of a blob.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.blobs.read().await.get(key).cloned()
    }

    /// Seed a blob directly.
    pub async fn insert(&self, key: &str, blob: &str) {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), blob.to_string());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, blob: &str) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ShelterError::Persistence(format!(
                "save of '{}' rejected",
                key
            )));
        }
        self.blobs
            .write()
            .await
            .insert(key.to_string(), blob.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryBlobStore::new();
        let other = store.clone();
        store.save("k", "v").await.unwrap();
        assert_eq!(other.load("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(other.save_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_saves() {
        let store = MemoryBlobStore::new();
        store.set_fail_saves(true);
        assert!(store.save("k", "v").await.is_err());
        assert!(store.get("k").await.is_none());

        store.set_fail_saves(false);
        store.save("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryBlobStore::new();
        store.insert("k", "v").await;
        store.remove("k").await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());
    }
}
