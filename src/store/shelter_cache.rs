//! Fingerprint → raw payload cache.
//!
//! The raw payload is kept (rather than the canonical record) so fields the
//! canonical model does not capture survive a restart.

use std::collections::HashMap;

use crate::error::Result;
use crate::shelter::{CacheKey, RawShelterPayload};

/// Raw shelter payloads keyed by content fingerprint. Later writes for the
/// same key replace earlier ones.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ShelterCacheStore {
    entries: HashMap<CacheKey, RawShelterPayload>,
}

impl ShelterCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns `true` if the key was new.
    pub fn upsert(&mut self, key: CacheKey, payload: RawShelterPayload) -> bool {
        self.entries.insert(key, payload).is_none()
    }

    pub fn get(&self, key: &str) -> Option<&RawShelterPayload> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cache keys, sorted.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize to the persisted JSON form: `{ "<key>": <payload>, ... }`.
    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    pub fn from_blob(blob: &str) -> Result<Self> {
        let entries: HashMap<CacheKey, RawShelterPayload> = serde_json::from_str(blob)?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: serde_json::Value) -> RawShelterPayload {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut store = ShelterCacheStore::new();
        assert!(store.upsert("k".into(), payload(json!({"name": "old"}))));
        assert!(!store.upsert("k".into(), payload(json!({"name": "new"}))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k").unwrap()["name"], "new");
    }

    #[test]
    fn test_keys_sorted() {
        let mut store = ShelterCacheStore::new();
        store.upsert("b".into(), payload(json!({})));
        store.upsert("a".into(), payload(json!({})));
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_blob_roundtrip_keeps_unknown_fields() {
        let mut store = ShelterCacheStore::new();
        store.upsert(
            "k".into(),
            payload(json!({"name": "Hall", "pets_allowed": true})),
        );
        let restored = ShelterCacheStore::from_blob(&store.to_blob().unwrap()).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.get("k").unwrap()["pets_allowed"], true);
    }

    #[test]
    fn test_from_blob_rejects_non_object_entries() {
        assert!(ShelterCacheStore::from_blob(r#"{"k": 1}"#).is_err());
    }

    #[test]
    fn test_clear() {
        let mut store = ShelterCacheStore::new();
        store.upsert("k".into(), payload(json!({})));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("k").is_none());
    }
}
