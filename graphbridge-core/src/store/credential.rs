//! Credential persistence with secure-store preference and file fallback.

use std::fmt;
use std::path::PathBuf;

use super::{FileStore, Secret, SecretStore, StoreError};

/// The two artifacts the credential lifecycle persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheArtifact {
    /// Serialized credential cache (all accounts and their tokens).
    TokenCache,
    /// Serialized `{ "accountId": ... }` selection marker.
    SelectedAccount,
}

impl CacheArtifact {
    /// Key used in the secure store.
    pub fn key(&self) -> &'static str {
        match self {
            Self::TokenCache => "token-cache",
            Self::SelectedAccount => "selected-account",
        }
    }
}

impl fmt::Display for CacheArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// File locations for the fallback medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    pub token_cache: PathBuf,
    pub selected_account: PathBuf,
}

impl CredentialPaths {
    /// Place both artifacts inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            token_cache: dir.join(".token-cache.json"),
            selected_account: dir.join(".selected-account.json"),
        }
    }

    fn for_artifact(&self, artifact: CacheArtifact) -> &PathBuf {
        match artifact {
            CacheArtifact::TokenCache => &self.token_cache,
            CacheArtifact::SelectedAccount => &self.selected_account,
        }
    }
}

impl Default for CredentialPaths {
    fn default() -> Self {
        let dir = directories::ProjectDirs::from("dev", "graphbridge", "graphbridge")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".graphbridge"));
        Self::in_dir(dir)
    }
}

/// Persists credential artifacts, preferring the secure store.
///
/// Any secure-store failure (including the store being absent) degrades to
/// the owner-only file for that artifact. An error is only surfaced when
/// every medium failed.
pub struct CredentialStore {
    secure: Option<Box<dyn SecretStore>>,
    paths: CredentialPaths,
}

impl CredentialStore {
    /// Create a credential store from an optional secure backend and fallback paths.
    pub fn new(secure: Option<Box<dyn SecretStore>>, paths: CredentialPaths) -> Self {
        Self { secure, paths }
    }

    /// Create a store that only uses files.
    pub fn file_only(paths: CredentialPaths) -> Self {
        Self::new(None, paths)
    }

    /// Fallback file locations.
    pub fn paths(&self) -> &CredentialPaths {
        &self.paths
    }

    fn file(&self, artifact: CacheArtifact) -> FileStore {
        FileStore::new(self.paths.for_artifact(artifact).clone())
    }

    /// Persist `payload` for `artifact`.
    pub async fn save(&self, artifact: CacheArtifact, payload: &str) -> Result<(), StoreError> {
        if let Some(secure) = &self.secure {
            match secure.set(artifact.key(), &Secret::new(payload)).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        "Secure store save failed for {}, falling back to file storage: {}",
                        artifact,
                        e
                    );
                }
            }
        }

        self.file(artifact)
            .write(payload)
            .await
            .map_err(|e| StoreError::AllMediaFailed {
                artifact: artifact.to_string(),
                message: e.to_string(),
            })
    }

    /// Load the payload for `artifact`.
    ///
    /// Returns `Ok(None)` when neither medium holds data.
    pub async fn load(&self, artifact: CacheArtifact) -> Result<Option<String>, StoreError> {
        let mut secure_error = None;

        if let Some(secure) = &self.secure {
            match secure.get(artifact.key()).await {
                Ok(Some(secret)) => return Ok(Some(secret.into_inner())),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        "Secure store access failed for {}, falling back to file storage: {}",
                        artifact,
                        e
                    );
                    secure_error = Some(e);
                }
            }
        }

        match self.file(artifact).read().await {
            Ok(contents) => Ok(contents),
            Err(e) => match secure_error {
                Some(secure_error) => Err(StoreError::AllMediaFailed {
                    artifact: artifact.to_string(),
                    message: format!("{}; {}", secure_error, e),
                }),
                None => Err(e),
            },
        }
    }

    /// Remove `artifact` from both media, best-effort.
    pub async fn delete(&self, artifact: CacheArtifact) -> Result<(), StoreError> {
        let mut failures = Vec::new();

        if let Some(secure) = &self.secure {
            if let Err(e) = secure.delete(artifact.key()).await {
                tracing::warn!("Secure store deletion failed for {}: {}", artifact, e);
                failures.push(e.to_string());
            }
        }

        if let Err(e) = self.file(artifact).remove().await {
            tracing::warn!("File deletion failed for {}: {}", artifact, e);
            failures.push(e.to_string());
        }

        let media = if self.secure.is_some() { 2 } else { 1 };
        if failures.len() == media {
            return Err(StoreError::AllMediaFailed {
                artifact: artifact.to_string(),
                message: failures.join("; "),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("secure", &self.secure.is_some())
            .field("paths", &self.paths)
            .finish()
    }
}
