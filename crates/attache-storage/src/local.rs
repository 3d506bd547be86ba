//! Filesystem backend: every key maps to a file below a root directory.

use crate::keys;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::{ObjectInfo, StorageBackend};
use async_trait::async_trait;
use attache_core::constants::{DEFAULT_CLEANUP_CONCURRENCY, DEFAULT_TEMP_PREFIX};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
    temp_prefix: String,
    batch_concurrency: usize,
}

impl LocalStorage {
    /// Open (creating it if needed) the directory `root`, whose files are
    /// served under `public_url`, e.g. `http://localhost:3000/files`.
    pub async fn new(root: impl Into<PathBuf>, public_url: String) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!("Cannot create {}: {}", root.display(), e))
        })?;

        Ok(LocalStorage {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            batch_concurrency: DEFAULT_CLEANUP_CONCURRENCY,
        })
    }

    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    /// Map a key to its file. Keys that would land outside the root are
    /// rejected, including through symlinks that already exist.
    fn resolve(&self, storage_key: &str) -> StorageResult<PathBuf> {
        keys::validate_key(storage_key)?;
        let path = self.root.join(storage_key);

        let root = self.root.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Storage root {} is unusable: {}", self.root.display(), e))
        })?;
        match path.canonicalize() {
            Ok(real) if !real.starts_with(&root) => Err(StorageError::InvalidKey(format!(
                "'{}' escapes the storage root",
                storage_key
            ))),
            _ => Ok(path),
        }
    }

    fn url_for(&self, storage_key: &str) -> String {
        format!("{}/{}", self.public_url, storage_key)
    }

    async fn is_file(path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_parents(path: &Path) -> StorageResult<()> {
        match path.parent() {
            Some(dir) => Ok(fs::create_dir_all(dir).await?),
            None => Ok(()),
        }
    }

    /// Resolve both ends of a transfer and make sure the source exists.
    async fn transfer_paths(&self, from_key: &str, to_key: &str) -> StorageResult<(PathBuf, PathBuf)> {
        let from = self.resolve(from_key)?;
        let to = self.resolve(to_key)?;
        if !Self::is_file(&from).await {
            return Err(StorageError::NotFound(from_key.to_string()));
        }
        Self::create_parents(&to).await?;
        Ok((from, to))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.resolve(storage_key)?;
        Self::create_parents(&path).await?;
        let start = Instant::now();

        let write_failed =
            |e: std::io::Error| StorageError::UploadFailed(format!("{}: {}", path.display(), e));
        let mut file = fs::File::create(&path).await.map_err(write_failed)?;
        file.write_all(&data).await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;

        tracing::debug!(
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored file"
        );
        Ok(self.url_for(storage_key))
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(storage_key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!("{}: {}", path.display(), e))),
        }
    }

    async fn head(&self, storage_key: &str) -> StorageResult<ObjectInfo> {
        let path = self.resolve(storage_key)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(StorageError::NotFound(storage_key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => return Err(StorageError::BackendError(e.to_string())),
        };

        let last_modified: Option<DateTime<Utc>> = meta.modified().ok().map(DateTime::from);
        // Size plus mtime stands in for a content hash.
        let etag = last_modified
            .and_then(|t| t.timestamp_nanos_opt())
            .map(|nanos| format!("{:x}-{:x}", meta.len(), nanos));

        Ok(ObjectInfo {
            bucket: self.root.display().to_string(),
            key: storage_key.to_string(),
            etag,
            size: meta.len(),
            content_type: None,
            last_modified,
            metadata: HashMap::new(),
        })
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.resolve(storage_key)?;
        Ok(Self::is_file(&path).await)
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        let (from, to) = self.transfer_paths(from_key, to_key).await?;
        fs::copy(&from, &to).await.map_err(|e| {
            StorageError::BackendError(format!("Copy {} -> {}: {}", from_key, to_key, e))
        })?;

        tracing::debug!(from_key = %from_key, to_key = %to_key, "Copied file");
        Ok(self.url_for(to_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.resolve(storage_key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %storage_key, "Removed file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!("{}: {}", path.display(), e))),
        }
    }

    async fn presigned_get_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        // Files are served as-is; the public URL never expires.
        self.resolve(storage_key)?;
        Ok(self.url_for(storage_key))
    }

    async fn presigned_put_url(
        &self,
        _storage_key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::ConfigError(
            "The local backend cannot issue upload URLs".to_string(),
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn temp_prefix(&self) -> &str {
        &self.temp_prefix
    }

    fn batch_concurrency(&self) -> usize {
        self.batch_concurrency
    }

    /// A rename inside the root replaces the copy-then-delete of other backends.
    async fn promote(&self, storage_key: &str) -> StorageResult<String> {
        let Some(permanent) = keys::strip_temp_prefix(storage_key, &self.temp_prefix) else {
            return Ok(storage_key.to_string());
        };
        let permanent = permanent.to_string();

        let (from, to) = self.transfer_paths(storage_key, &permanent).await?;
        fs::rename(&from, &to).await.map_err(|e| {
            StorageError::BackendError(format!("Move {} -> {}: {}", storage_key, permanent, e))
        })?;

        tracing::debug!(key = %storage_key, new_key = %permanent, "Moved temp file into place");
        Ok(permanent)
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage_in(dir: &tempfile::TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), "http://localhost:3000/files".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let url = storage
            .put("docs/a.txt", b"test data".to_vec(), "text/plain")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/files/docs/a.txt");

        let downloaded = storage.get("docs/a.txt").await.unwrap();
        assert_eq!(downloaded, b"test data".to_vec());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        assert!(storage.delete("nonexistent/file.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_head() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        storage
            .put("a/b.bin", vec![0u8; 42], "application/octet-stream")
            .await
            .unwrap();

        let info = storage.head("a/b.bin").await.unwrap();
        assert_eq!(info.key, "a/b.bin");
        assert_eq!(info.size, 42);
        assert!(info.last_modified.is_some());
        assert!(info.etag.is_some());

        assert!(matches!(
            storage.head("a/missing.bin").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_promote_moves_temp_file() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        storage
            .put("temp/a/doc1.pdf", b"pdf".to_vec(), "application/pdf")
            .await
            .unwrap();

        let new_key = storage.promote("temp/a/doc1.pdf").await.unwrap();
        assert_eq!(new_key, "a/doc1.pdf");
        assert!(storage.exists("a/doc1.pdf").await.unwrap());
        assert!(!storage.exists("temp/a/doc1.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_permanent_key_is_noop() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        // No file exists: a no-op must not touch the filesystem at all.
        let key = storage.promote("a/doc1.pdf").await.unwrap();
        assert_eq!(key, "a/doc1.pdf");
    }

    #[tokio::test]
    async fn test_promote_missing_temp_file_fails() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let result = storage.promote("temp/gone.pdf").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_batch_removes_all() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await.with_batch_concurrency(2);

        let keys: Vec<String> = (0..5).map(|i| format!("batch/{}.txt", i)).collect();
        for key in &keys {
            storage.put(key, b"x".to_vec(), "text/plain").await.unwrap();
        }

        storage.delete_batch(&keys).await.unwrap();

        for key in &keys {
            assert!(!storage.exists(key).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_delete_batch_reports_failures() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let keys = vec!["ok.txt".to_string(), "../bad.txt".to_string()];
        let err = storage.delete_batch(&keys).await.unwrap_err();
        assert!(err.to_string().contains("1 of 2 deletes failed"));
    }

    #[tokio::test]
    async fn test_presigned_put_unsupported() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir).await;

        let result = storage
            .presigned_put_url("a.txt", "text/plain", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
