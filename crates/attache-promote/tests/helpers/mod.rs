//! Shared fixtures for promotion tests.
#![allow(dead_code)]

use async_trait::async_trait;
use attache_promote::{NullString, Record, RecordSchema};
use attache_storage::{ObjectInfo, Storage, StorageBackend, StorageError, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// A storage call observed by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Copy { from: String, to: String },
    Delete(String),
    DeleteBatch(Vec<String>),
}

/// In-memory storage that records mutating calls and can be told to fail.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
    failing_copies: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-populated with `keys`.
    pub fn with_files(keys: &[&str]) -> Self {
        let storage = Self::new();
        for key in keys {
            storage.set_file(key);
        }
        storage
    }

    pub fn set_file(&self, key: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), key.as_bytes().to_vec());
    }

    pub fn has_file(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    pub fn fail_copy_from(&self, key: &str) {
        self.failing_copies.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn copies(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Copy { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, storage_key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        self.files
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), data);
        Ok(format!("memory://{}", storage_key))
    }

    async fn get(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn head(&self, storage_key: &str) -> StorageResult<ObjectInfo> {
        let size = self
            .files
            .lock()
            .unwrap()
            .get(storage_key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))?;
        Ok(ObjectInfo {
            bucket: "memory".to_string(),
            key: storage_key.to_string(),
            etag: None,
            size,
            content_type: None,
            last_modified: None,
            metadata: HashMap::new(),
        })
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.has_file(storage_key))
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        self.record(Call::Copy {
            from: from_key.to_string(),
            to: to_key.to_string(),
        });
        if self.failing_copies.lock().unwrap().contains(from_key) {
            return Err(StorageError::BackendError(format!("injected copy failure: {}", from_key)));
        }

        let mut files = self.files.lock().unwrap();
        let data = files
            .get(from_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from_key.to_string()))?;
        files.insert(to_key.to_string(), data);
        Ok(format!("memory://{}", to_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.record(Call::Delete(storage_key.to_string()));
        if self.failing_deletes.lock().unwrap().contains(storage_key) {
            return Err(StorageError::DeleteFailed(format!(
                "injected delete failure: {}",
                storage_key
            )));
        }
        self.files.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn delete_batch(&self, storage_keys: &[String]) -> StorageResult<()> {
        self.record(Call::DeleteBatch(storage_keys.to_vec()));
        let failing = self.failing_deletes.lock().unwrap().clone();
        let mut files = self.files.lock().unwrap();
        let mut failed = 0;
        for key in storage_keys {
            if failing.contains(key) {
                failed += 1;
            } else {
                files.remove(key);
            }
        }
        if failed > 0 {
            return Err(StorageError::DeleteFailed(format!(
                "{} of {} deletes failed",
                failed,
                storage_keys.len()
            )));
        }
        Ok(())
    }

    async fn presigned_get_url(&self, storage_key: &str, _expires_in: Duration) -> StorageResult<String> {
        Ok(format!("memory://{}?signed", storage_key))
    }

    async fn presigned_put_url(
        &self,
        storage_key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("memory://{}?signed", storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn temp_prefix(&self) -> &str {
        "temp/"
    }
}

/// A record touching every supported field shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub avatar: Option<String>,
    pub docs: Vec<String>,
    pub bio: String,
    pub notes: NullString,
    pub age: i64,
}

impl Record for Profile {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::<Self>::builder("profile")
            .field("avatar", "uploaded_file=kind:avatar", |p| &p.avatar, |p| &mut p.avatar)
            .field("docs", "uploaded_file=kind:document", |p| &p.docs, |p| &mut p.docs)
            .field("bio", "richtext", |p| &p.bio, |p| &mut p.bio)
            .field("notes", "markdown", |p| &p.notes, |p| &mut p.notes)
            .field("age", "uploaded_file", |p| &p.age, |p| &mut p.age)
            .build()
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
