//! Filesystem-backed media storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use scribe_core::ports::{MediaStorage, StorageError};

/// Writes uploads below a root directory that the web server also serves.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL for an object stored under `key`.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Map `key` onto a path under the root. Keys are relative paths without
    /// `..` or other non-normal components.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn store(&self, key: &str, data: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to write file: {e}")))?;

        tracing::debug!(%key, size = data.len(), "Stored media");
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("Failed to delete file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_storage() -> LocalMediaStorage {
        let root = std::env::temp_dir().join(format!("scribe-media-{}", uuid::Uuid::new_v4()));
        LocalMediaStorage::new(root, "/media/")
    }

    #[tokio::test]
    async fn test_store_writes_file_and_returns_url() {
        let storage = scratch_storage();

        let url = storage.store("posts/small.gif", b"GIF89a").await.unwrap();

        assert_eq!(url, "/media/posts/small.gif");
        let written = tokio::fs::read(storage.root().join("posts/small.gif"))
            .await
            .unwrap();
        assert_eq!(written, b"GIF89a");

        tokio::fs::remove_dir_all(storage.root()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let storage = scratch_storage();

        for key in ["../etc/passwd", "/abs/path.png", "posts/../../x", ""] {
            assert!(matches!(
                storage.store(key, b"data").await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let storage = scratch_storage();
        assert!(storage.delete("posts/never-written.png").await.is_ok());
    }
}
