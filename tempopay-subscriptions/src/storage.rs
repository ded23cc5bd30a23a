//! Durable key-value storage for subscription records.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::{Result, SubscriptionError, SubscriptionRecord};

/// Storage key prefix for subscription records.
pub const STORAGE_KEY_PREFIX: &str = "subscription:";

/// Asynchronous string-keyed store of opaque values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Volatile store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// One JSON file per key in a directory.
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("_{:02x}", byte));
            }
        }
        name.push_str(".json");
        self.base_path.join(name)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SubscriptionError::Storage(format!("{}: {}", path.display(), e)).into()),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .map_err(|e| SubscriptionError::Storage(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| SubscriptionError::Storage(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SubscriptionError::Storage(format!("{}: {}", path.display(), e)).into()),
        }
    }
}

/// Typed access to subscription records in a [`KeyValueStore`].
#[derive(Clone)]
pub struct SubscriptionStore {
    inner: Arc<dyn KeyValueStore>,
}

impl SubscriptionStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn storage_key(service_id: &str) -> String {
        format!("{}{}", STORAGE_KEY_PREFIX, service_id)
    }

    /// Read the record for a service. Undecodable records read as absent.
    pub async fn load(&self, service_id: &str) -> Result<Option<SubscriptionRecord>> {
        let Some(bytes) = self.inner.get(&Self::storage_key(service_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(service_id, error = %e, "ignoring undecodable subscription record");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, service_id: &str, record: &SubscriptionRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| SubscriptionError::Serialization(e.to_string()))?;
        self.inner.set(&Self::storage_key(service_id), bytes).await
    }

    pub async fn delete(&self, service_id: &str) -> Result<()> {
        self.inner.delete(&Self::storage_key(service_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> SubscriptionRecord {
        SubscriptionRecord {
            expires_at: 1_800_000_780_000,
            remaining_limit: 264_000_000,
            charges_remaining: 11,
            key_authorized: true,
            overdue: false,
            key_authorization: None,
            key_pair: Some(tempopay_lib::KeyPair::generate()),
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let memory = Arc::new(MemoryStore::new());
        let store = SubscriptionStore::new(memory.clone());
        let rec = record();

        store.save("echo", &rec).await.unwrap();
        assert!(memory.contains("subscription:echo"));
        assert_eq!(store.load("echo").await.unwrap(), Some(rec));

        store.delete("echo").await.unwrap();
        assert_eq!(store.load("echo").await.unwrap(), None);
        store.delete("echo").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let rec = record();
        {
            let store = SubscriptionStore::new(Arc::new(FileStore::new(dir.path()).unwrap()));
            store.save("spark", &rec).await.unwrap();
        }

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);

        let store = SubscriptionStore::new(Arc::new(FileStore::new(dir.path()).unwrap()));
        assert_eq!(store.load("spark").await.unwrap(), Some(rec));
        store.delete("spark").await.unwrap();
        assert_eq!(store.load("spark").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_record_reads_as_absent() {
        let memory = Arc::new(MemoryStore::new());
        memory
            .set("subscription:north", b"{not json".to_vec())
            .await
            .unwrap();
        let store = SubscriptionStore::new(memory);
        assert_eq!(store.load("north").await.unwrap(), None);
    }
}
