//! Owner-only file storage used when the secure store is unavailable.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::StoreError;

/// A single credential artifact persisted as a file.
///
/// Files are created with mode `0600` and parent directories with `0700`
/// on Unix. Writes go to a temporary sibling that is renamed into place,
/// so a reader never observes a partially written payload.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a file store for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file contents.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub async fn read(&self) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Replace the file contents atomically.
    pub async fn write(&self, contents: &str) -> Result<(), StoreError> {
        self.ensure_parent_dir().await?;

        let tmp_path = self.temp_path();
        let result = self.write_temp(&tmp_path, contents).await;
        let result = match result {
            Ok(()) => tokio::fs::rename(&tmp_path, &self.path)
                .await
                .map_err(|e| self.io_error(e)),
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result
    }

    /// Remove the file. Missing files are not an error.
    pub async fn remove(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);

        builder.create(parent).await.map_err(|e| StoreError::Io {
            path: parent.display().to_string(),
            source: e,
        })
    }

    async fn write_temp(&self, tmp_path: &Path, contents: &str) -> Result<(), StoreError> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(tmp_path).await.map_err(|e| self.io_error(e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credential".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("missing.json"));
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/deeper/cache.json");
        let store = FileStore::new(&path);

        store.write("{\"a\":1}").await.unwrap();

        assert_eq!(store.read().await.unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_write_replaces_contents_without_leftovers() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("cache.json"));

        store.write("first").await.unwrap();
        store.write("second").await.unwrap();

        assert_eq!(store.read().await.unwrap().as_deref(), Some("second"));
        let entries = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("private/cache.json");
        let store = FileStore::new(&path);
        store.write("secret").await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("cache.json"));

        store.write("x").await.unwrap();
        store.remove().await.unwrap();
        store.remove().await.unwrap();

        assert!(store.read().await.unwrap().is_none());
    }
}
