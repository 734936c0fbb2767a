//! Filesystem-backed object storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use shared::error::{AppError, AppResult, ErrorCode};

use super::{ObjectStorage, StoredObject, check_key};

pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// `base_url` is the public prefix the root directory is served under
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

fn storage_failed(e: impl std::fmt::Display) -> AppError {
    AppError::with_message(ErrorCode::FileStorageFailed, e.to_string())
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<StoredObject> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_failed)?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes).await.map_err(storage_failed)?;
        tracing::debug!(key = key, size = size, content_type = content_type, "Object stored");
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{key}", self.base_url),
        })
    }

    async fn get(&self, key: &str) -> AppResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::not_found(format!("object {key}")))
            }
            Err(e) => Err(storage_failed(e)),
        }
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let dir = self.path_for(prefix.trim_end_matches('/'))?;
        let mut keys = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(storage_failed(e)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(storage_failed)? {
            let is_file = entry.file_type().await.map_err(storage_failed)?.is_file();
            if is_file && let Some(name) = entry.file_name().to_str() {
                keys.push(format!("{}/{name}", prefix.trim_end_matches('/')));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:3000/files/");

        let stored = storage
            .put("backups/A/2.zip", vec![1, 2], "application/zip")
            .await
            .unwrap();
        assert_eq!(stored.url, "http://localhost:3000/files/backups/A/2.zip");
        storage.put("backups/A/1.zip", vec![3], "application/zip").await.unwrap();

        assert_eq!(storage.get("backups/A/2.zip").await.unwrap(), vec![1, 2]);
        assert_eq!(
            storage.list("backups/A").await.unwrap(),
            vec!["backups/A/1.zip".to_string(), "backups/A/2.zip".to_string()]
        );
        assert!(storage.list("backups/B").await.unwrap().is_empty());

        let err = storage.get("backups/A/3.zip").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(storage.get("../outside").await.is_err());
    }
}
