//! Platform credential store (Keychain, Secret Service, Credential Manager).

use async_trait::async_trait;
use keyring::Entry;

use super::{Secret, SecretStore, StoreError};

/// Entry used to probe whether a keyring backend exists at all.
const PROBE_ENTRY: &str = "graphbridge-probe";

/// Secret store backed by the OS keyring.
///
/// Each cache artifact is one keyring entry filed under the service name.
/// Backends that cap entry size (Windows limits a credential blob to a few
/// KiB) reject large token caches; those failures surface as
/// [`StoreError::BackendError`] so the credential store falls back to its file.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Open the keyring for `service`, failing when no backend is available.
    pub fn try_new(service: &str) -> Result<Self, StoreError> {
        Entry::new(service, PROBE_ENTRY).map_err(|e| StoreError::KeyringUnavailable {
            message: e.to_string(),
        })?;
        Ok(Self {
            service: service.to_string(),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|e| backend_error("open", key, e))
    }
}

fn backend_error(op: &str, key: &str, err: keyring::Error) -> StoreError {
    let message = match err {
        keyring::Error::TooLong(attr, limit) => {
            format!("cannot {} '{}': {} exceeds the keyring limit of {}", op, key, attr, limit)
        }
        keyring::Error::NoStorageAccess(e) => format!("cannot {} '{}': keyring is locked ({})", op, key, e),
        other => format!("cannot {} '{}': {}", op, key, other),
    };
    StoreError::BackendError { message }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore").field("service", &self.service).finish()
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(payload) => Ok(Some(Secret::new(payload))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(backend_error("read", key, e)),
        }
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(secret.expose())
            .map_err(|e| backend_error("write", key, e))?;
        tracing::trace!(key, "Wrote keyring entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(backend_error("delete", key, e)),
        }
    }
}
