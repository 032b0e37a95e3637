//! Local metadata store.
//!
//! Three record types share the `vault` namespace:
//!
//! | Key | Record |
//! |-----|--------|
//! | `info_<vaultID>` | [`VaultInfo`] |
//! | `meta_doc_info_<vaultID>_<docID>` | [`DocMetaInfo`] |
//! | `authorization_<vaultID>_<authID>` | [`CreatedAuthorization`] |
//!
//! Records are JSON. There are no cross-key transactions; the only
//! conditional write is [`MetadataStore::put_if_absent`].

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use vcvault_storage::{KvStore, ScopedKvStore};

use crate::error::{VaultError, VaultResult};
use crate::model::{CreatedAuthorization, DocMetaInfo, VaultInfo};

/// Namespace holding vault metadata.
pub const METADATA_NAMESPACE: &str = "vault";

/// Key of a vault's [`VaultInfo`].
#[must_use]
pub fn info_key(vault_id: &str) -> String {
    format!("info_{vault_id}")
}

/// Key of a document's [`DocMetaInfo`].
#[must_use]
pub fn doc_meta_key(vault_id: &str, doc_id: &str) -> String {
    format!("meta_doc_info_{vault_id}_{doc_id}")
}

/// Key of a [`CreatedAuthorization`].
#[must_use]
pub fn authorization_key(vault_id: &str, auth_id: &str) -> String {
    format!("authorization_{vault_id}_{auth_id}")
}

/// Byte-level and typed access to vault metadata.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    inner: ScopedKvStore,
}

impl MetadataStore {
    /// Use the [`METADATA_NAMESPACE`] namespace of `store`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>) -> VaultResult<Self> {
        Ok(Self {
            inner: ScopedKvStore::new(store, METADATA_NAMESPACE)?,
        })
    }

    /// Store bytes under `key`, overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if the backend fails.
    pub async fn put(&self, key: &str, value: Vec<u8>) -> VaultResult<()> {
        Ok(self.inner.set(key, value).await?)
    }

    /// Read the bytes under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] if nothing is stored under `key`.
    pub async fn get(&self, key: &str) -> VaultResult<Vec<u8>> {
        self.inner
            .get(key)
            .await?
            .ok_or_else(|| VaultError::NotFound(key.to_string()))
    }

    /// Store bytes under `key` unless it is taken. Returns `true` if this
    /// call created the record.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if the backend fails.
    pub async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> VaultResult<bool> {
        Ok(self.inner.set_if_absent(key, value).await?)
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> VaultResult<()> {
        Ok(self.inner.set_json(key, value).await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> VaultResult<T> {
        self.inner
            .get_json(key)
            .await?
            .ok_or_else(|| VaultError::NotFound(key.to_string()))
    }

    /// Persist a vault record.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if encoding or the backend fails.
    pub async fn save_vault_info(&self, vault_id: &str, info: &VaultInfo) -> VaultResult<()> {
        self.put_json(&info_key(vault_id), info).await
    }

    /// Load a vault record.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] for an unknown vault.
    pub async fn vault_info(&self, vault_id: &str) -> VaultResult<VaultInfo> {
        self.get_json(&info_key(vault_id))
            .await
            .map_err(|e| match e {
                VaultError::NotFound(_) => VaultError::NotFound(format!("vault {vault_id}")),
                other => other,
            })
    }

    /// Load a document record, or `None` if the document was never saved.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if the stored record is unreadable.
    pub async fn doc_meta(&self, vault_id: &str, doc_id: &str) -> VaultResult<Option<DocMetaInfo>> {
        Ok(self.inner.get_json(&doc_meta_key(vault_id, doc_id)).await?)
    }

    /// Persist a document record unless one exists. Returns `true` if this
    /// call created it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if encoding or the backend fails.
    pub async fn create_doc_meta(
        &self,
        vault_id: &str,
        doc_id: &str,
        meta: &DocMetaInfo,
    ) -> VaultResult<bool> {
        Ok(self
            .inner
            .set_json_if_absent(&doc_meta_key(vault_id, doc_id), meta)
            .await?)
    }

    /// Persist an authorization.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if encoding or the backend fails.
    pub async fn save_authorization(
        &self,
        vault_id: &str,
        authorization: &CreatedAuthorization,
    ) -> VaultResult<()> {
        self.put_json(&authorization_key(vault_id, &authorization.id), authorization)
            .await
    }

    /// Load an authorization.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] if it was never created.
    pub async fn authorization(
        &self,
        vault_id: &str,
        auth_id: &str,
    ) -> VaultResult<CreatedAuthorization> {
        self.get_json(&authorization_key(vault_id, auth_id))
            .await
            .map_err(|e| match e {
                VaultError::NotFound(_) => VaultError::NotFound(format!(
                    "authorization {auth_id} of vault {vault_id}"
                )),
                other => other,
            })
    }
}
