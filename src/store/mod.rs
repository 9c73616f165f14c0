//! Object store contract (spec §4.2): a four-verb interface the sync engine
//! drives, plus an in-memory fake used by this crate's own tests and
//! available to downstream integration tests. The S3-compatible,
//! SigV4-signing implementation lives in the sibling `pkb-s3-store` crate so
//! it can carry its own narrow dependency set (reqwest, hmac, sha2).

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

/// Errors an `ObjectStore` implementation can surface. Distinct from
/// `CoreError` so a store crate doesn't need to depend on the whole sync
/// engine just to report "not found" vs. "auth failed" vs. "retry me" —
/// `pkb-core` flattens this into `CoreError` at the sync-engine boundary.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("auth failed: {0}")]
    AuthFailed(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("object store failed: {0}")]
    Failed(String),
}

impl From<ObjectStoreError> for crate::error::CoreError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(m) => crate::error::CoreError::SyncFailed(m),
            ObjectStoreError::AuthFailed(m) => crate::error::CoreError::SyncAuthFailed(m),
            ObjectStoreError::QuotaExceeded(m) => crate::error::CoreError::SyncQuotaExceeded(m),
            ObjectStoreError::Failed(m) => crate::error::CoreError::ObjectStore(m),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, ObjectStoreError>;

/// Four-verb blob store contract consumed by the sync engine.
///
/// Keys are opaque strings; the sync engine uses the `items/` prefix and the
/// `items/{uuid}.json` key template (spec §4.2).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()>;
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// In-memory `ObjectStore`, capability-equivalent to a real backend but with
/// no network. Used by the engine's own test suite and exported for
/// downstream integration tests that don't want live network calls.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: how many objects are currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        self.objects.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryObjectStore::new();
        store.put("items/a.json", b"hello".to_vec()).await.unwrap();
        let got = store.get("items/a.json").await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("items/missing.json").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let store = InMemoryObjectStore::new();
        store.put("items/a.json", vec![]).await.unwrap();
        store.put("items/b.json", vec![]).await.unwrap();
        store.put("other/c.json", vec![]).await.unwrap();
        let mut keys = store.list("items/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["items/a.json", "items/b.json"]);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = InMemoryObjectStore::new();
        store.put("items/a.json", vec![1]).await.unwrap();
        store.delete("items/a.json").await.unwrap();
        assert!(store.get("items/a.json").await.is_err());
    }
}
