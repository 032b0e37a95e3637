//! Namespaced key-value store trait and backends.
//!
//! Every record lives under a `(namespace, key)` pair. The vault client uses
//! one namespace for its metadata records and the local key manager another
//! for secret key material, so the two never collide.
//!
//! [`KvStore::set_if_absent`] is the only conditional write. It is what makes
//! the first save of a document race-free: whichever writer lands first owns
//! the record, later writers see `false` and re-read it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() || namespace.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "namespace {namespace:?} must be non-empty and free of null bytes"
        )));
    }
    Ok(())
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "key {key:?} must be non-empty and free of null bytes"
        )));
    }
    Ok(())
}

/// Namespaced byte-level storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value, or `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Set a value only if the key does not exist yet.
    ///
    /// Returns `true` if this call created the record.
    async fn set_if_absent(&self, namespace: &str, key: &str, value: Vec<u8>)
    -> StorageResult<bool>;

    /// Check whether a key exists.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }
}

/// In-memory store for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_key(namespace: &str, key: &str) -> StorageResult<(String, String)> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok((namespace.to_string(), key.to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let entry = Self::entry_key(namespace, key)?;
        Ok(self.data.read().await.get(&entry).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let entry = Self::entry_key(namespace, key)?;
        self.data.write().await.insert(entry, value);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        let entry = Self::entry_key(namespace, key)?;
        let mut data = self.data.write().await;
        if data.contains_key(&entry) {
            return Ok(false);
        }
        data.insert(entry, value);
        Ok(true)
    }
}

/// Durable store backed by `SurrealKV`.
///
/// Records are stored under the composite key `namespace \0 key`.
#[cfg(feature = "kv")]
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

#[cfg(feature = "kv")]
impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

#[cfg(feature = "kv")]
impl SurrealKvStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "opened metadata store");
        Ok(Self { tree })
    }

    fn composite_key(namespace: &str, key: &str) -> StorageResult<Vec<u8>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok([namespace.as_bytes(), b"\0", key.as_bytes()].concat())
    }
}

#[cfg(feature = "kv")]
#[allow(clippy::needless_pass_by_value)]
fn backend_err(e: surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[cfg(feature = "kv")]
#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let ck = Self::composite_key(namespace, key)?;
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(backend_err)?;
        tx.get(&ck).map_err(backend_err)
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let ck = Self::composite_key(namespace, key)?;
        let mut tx = self.tree.begin().map_err(backend_err)?;
        tx.set(&ck, &value).map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)
    }

    async fn set_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        let ck = Self::composite_key(namespace, key)?;
        let mut tx = self.tree.begin().map_err(backend_err)?;
        if tx.get(&ck).map_err(backend_err)?.is_some() {
            return Ok(false);
        }
        tx.set(&ck, &value).map_err(backend_err)?;
        // A concurrent writer of the same key makes this commit fail with a
        // conflict, so at most one caller observes `true`.
        tx.commit().await.map_err(backend_err)?;
        Ok(true)
    }
}

/// A [`KvStore`] view with its namespace pre-bound and JSON helpers.
#[derive(Clone)]
pub struct ScopedKvStore {
    inner: Arc<dyn KvStore>,
    namespace: String,
}

impl std::fmt::Debug for ScopedKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedKvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedKvStore {
    /// Bind `store` to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is empty or
    /// contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Store raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Store raw bytes only if `key` is unused. Returns `true` if this call
    /// created the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend fails.
    pub async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> StorageResult<bool> {
        self.inner.set_if_absent(&self.namespace, key, value).await
    }

    /// Read and decode a JSON record, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the stored bytes are not
    /// valid JSON for `T`.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        match self.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(format!("{key}: {e}"))),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.set(key, encode_json(key, value)?).await
    }

    /// Encode `value` as JSON and store it only if `key` is unused.
    ///
    /// Returns `true` if this call created the record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if encoding fails.
    pub async fn set_json_if_absent<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<bool> {
        self.set_if_absent(key, encode_json(key, value)?).await
    }
}

fn encode_json<T: serde::Serialize>(key: &str, value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct DocRecord {
        edv_id: String,
        kid_url: String,
    }

    fn record(edv_id: &str) -> DocRecord {
        DocRecord {
            edv_id: edv_id.into(),
            kid_url: "https://kms.example.com/keys/1".into(),
        }
    }

    #[tokio::test]
    async fn test_memory_get_set_overwrite() {
        let store = MemoryKvStore::new();
        assert!(store.get("vault", "k").await.unwrap().is_none());

        store.set("vault", "k", b"v1".to_vec()).await.unwrap();
        store.set("vault", "k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("vault", "k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_set_if_absent_keeps_first_value() {
        let store = MemoryKvStore::new();
        assert!(store.set_if_absent("vault", "k", b"first".to_vec()).await.unwrap());
        assert!(!store.set_if_absent("vault", "k", b"second".to_vec()).await.unwrap());
        assert_eq!(
            store.get("vault", "k").await.unwrap(),
            Some(b"first".to_vec())
        );
    }

    #[tokio::test]
    async fn test_memory_set_if_absent_is_exclusive_under_contention() {
        let store = Arc::new(MemoryKvStore::new());
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set_if_absent("vault", "race", vec![i]).await.unwrap()
            }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }
        assert_eq!(outcomes.iter().filter(|created| **created).count(), 1);
    }

    #[tokio::test]
    async fn test_memory_exists() {
        let store = MemoryKvStore::new();
        assert!(!store.exists("vault", "k").await.unwrap());
        store.set("vault", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists("vault", "k").await.unwrap());
        assert!(!store.exists("other", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation() {
        let store = MemoryKvStore::new();
        store.set("vault", "k", b"meta".to_vec()).await.unwrap();
        store.set("kms:local", "k", b"secret".to_vec()).await.unwrap();
        assert_eq!(store.get("vault", "k").await.unwrap(), Some(b"meta".to_vec()));
        assert_eq!(
            store.get("kms:local", "k").await.unwrap(),
            Some(b"secret".to_vec())
        );
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let store = MemoryKvStore::new();
        assert!(matches!(
            store.get("", "k").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.set("vault", "", Vec::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(store.get("vault", "a\0b").await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_json_round_trip() {
        let scoped = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "vault").unwrap();
        scoped
            .set_json("meta_doc_info_v_d", &record("edv-1"))
            .await
            .unwrap();

        let loaded: DocRecord = scoped.get_json("meta_doc_info_v_d").await.unwrap().unwrap();
        assert_eq!(loaded, record("edv-1"));

        let missing: Option<DocRecord> = scoped.get_json("missing").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_scoped_json_if_absent() {
        let scoped = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "vault").unwrap();
        assert!(scoped.set_json_if_absent("d", &record("a")).await.unwrap());
        assert!(!scoped.set_json_if_absent("d", &record("b")).await.unwrap());

        let loaded: DocRecord = scoped.get_json("d").await.unwrap().unwrap();
        assert_eq!(loaded.edv_id, "a");
    }

    #[tokio::test]
    async fn test_scoped_json_decode_error() {
        let scoped = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "vault").unwrap();
        scoped.set("bad", b"not json".to_vec()).await.unwrap();
        let result: StorageResult<Option<DocRecord>> = scoped.get_json("bad").await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_scoped_rejects_empty_namespace() {
        assert!(ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "").is_err());
    }

    #[cfg(feature = "kv")]
    mod surreal_kv_tests {
        use super::*;

        fn open_store() -> (SurrealKvStore, tempfile::TempDir) {
            let dir = tempfile::tempdir().unwrap();
            let store = SurrealKvStore::open(dir.path()).unwrap();
            (store, dir)
        }

        #[tokio::test]
        async fn test_surreal_set_get() {
            let (store, _dir) = open_store();
            store.set("vault", "k", b"v".to_vec()).await.unwrap();
            assert_eq!(store.get("vault", "k").await.unwrap(), Some(b"v".to_vec()));
        }

        #[tokio::test]
        async fn test_surreal_set_if_absent() {
            let (store, _dir) = open_store();
            assert!(store.set_if_absent("vault", "k", b"a".to_vec()).await.unwrap());
            assert!(!store.set_if_absent("vault", "k", b"b".to_vec()).await.unwrap());
            assert_eq!(store.get("vault", "k").await.unwrap(), Some(b"a".to_vec()));
        }
    }
}
