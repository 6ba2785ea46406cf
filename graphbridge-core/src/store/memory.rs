//! Process-local secret store, used in tests and when persistence is unwanted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{Secret, SecretStore, StoreError};

/// Secret store that keeps entries in memory until the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Secret>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").field("keys", &self.keys()).finish()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), secret.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheArtifact;

    #[tokio::test]
    async fn test_holds_each_artifact_separately() {
        let store = MemoryStore::new();
        store
            .set(CacheArtifact::TokenCache.key(), &Secret::new(r#"{"accounts":[]}"#))
            .await
            .unwrap();
        store
            .set(CacheArtifact::SelectedAccount.key(), &Secret::new("oid.tid"))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        let selected = store.get(CacheArtifact::SelectedAccount.key()).await.unwrap().unwrap();
        assert_eq!(selected.expose(), "oid.tid");
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let store = MemoryStore::new();
        store.set("k", &Secret::new("one")).await.unwrap();
        store.set("k", &Secret::new("two")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().expose(), "two");

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_debug_lists_keys_not_values() {
        let store = MemoryStore::new();
        store.entries.lock().insert("selected-account".into(), Secret::new("hidden-value"));
        let debug = format!("{:?}", store);
        assert!(debug.contains("selected-account"));
        assert!(!debug.contains("hidden-value"));
    }
}
