//! Integration tests for credential persistence.
//!
//! These tests verify that the credential store:
//! - Prefers the secure store when it works
//! - Falls back to owner-only files when the secure store fails
//! - Only reports an error when every medium failed

use async_trait::async_trait;
use graphbridge_core::{
    CacheArtifact, CredentialPaths, CredentialStore, MemoryStore, Secret, SecretStore, StoreError,
};
use tempfile::TempDir;

/// Secure store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl SecretStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Secret>, StoreError> {
        Err(StoreError::KeyringUnavailable {
            message: "no secret service on this bus".to_string(),
        })
    }

    async fn set(&self, _key: &str, _secret: &Secret) -> Result<(), StoreError> {
        Err(StoreError::KeyringUnavailable {
            message: "no secret service on this bus".to_string(),
        })
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::KeyringUnavailable {
            message: "no secret service on this bus".to_string(),
        })
    }
}

#[tokio::test]
async fn test_failing_secure_store_falls_back_to_file() {
    let temp = TempDir::new().unwrap();
    let paths = CredentialPaths::in_dir(temp.path());
    let store = CredentialStore::new(Some(Box::new(BrokenStore)), paths.clone());

    let payload = r#"{"version":1,"accounts":[]}"#;
    store.save(CacheArtifact::TokenCache, payload).await.unwrap();

    assert_eq!(
        store.load(CacheArtifact::TokenCache).await.unwrap().as_deref(),
        Some(payload)
    );
    assert_eq!(std::fs::read_to_string(&paths.token_cache).unwrap(), payload);
}

#[tokio::test]
async fn test_working_secure_store_skips_file() {
    let temp = TempDir::new().unwrap();
    let paths = CredentialPaths::in_dir(temp.path());
    let store = CredentialStore::new(Some(Box::new(MemoryStore::new())), paths.clone());

    store
        .save(CacheArtifact::SelectedAccount, r#"{"accountId":"oid.tid"}"#)
        .await
        .unwrap();

    assert!(!paths.selected_account.exists());
    assert_eq!(
        store.load(CacheArtifact::SelectedAccount).await.unwrap().as_deref(),
        Some(r#"{"accountId":"oid.tid"}"#)
    );
}

#[tokio::test]
async fn test_missing_everywhere_is_none() {
    let temp = TempDir::new().unwrap();
    let store = CredentialStore::new(Some(Box::new(BrokenStore)), CredentialPaths::in_dir(temp.path()));

    assert!(store.load(CacheArtifact::TokenCache).await.unwrap().is_none());
}

#[tokio::test]
async fn test_all_media_failed_surfaces_error() {
    let temp = TempDir::new().unwrap();
    // A directory where the cache file should be makes every file operation fail.
    let blocked = temp.path().join("blocked");
    std::fs::create_dir_all(blocked.join("token-cache.json")).unwrap();
    let paths = CredentialPaths {
        token_cache: blocked.join("token-cache.json"),
        selected_account: blocked.join("selected.json"),
    };
    let store = CredentialStore::new(Some(Box::new(BrokenStore)), paths);

    let result = store.save(CacheArtifact::TokenCache, "{}").await;
    assert!(matches!(result, Err(StoreError::AllMediaFailed { .. })));
}

#[tokio::test]
async fn test_delete_removes_file_even_when_secure_store_fails() {
    let temp = TempDir::new().unwrap();
    let paths = CredentialPaths::in_dir(temp.path());
    let store = CredentialStore::new(Some(Box::new(BrokenStore)), paths.clone());

    store.save(CacheArtifact::TokenCache, "{}").await.unwrap();
    assert!(paths.token_cache.exists());

    store.delete(CacheArtifact::TokenCache).await.unwrap();
    assert!(!paths.token_cache.exists());
}
