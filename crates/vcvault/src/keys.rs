//! Local key manager for vault signing keys.
//!
//! Secret key bytes are kept in their own [`KvStore`] namespace so they never
//! share a keyspace with vault metadata. With a durable store the vault
//! identities survive restarts.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use vcvault_crypto::encoding::encode_b64url;
use vcvault_crypto::{KeyPair, PublicKey};
use vcvault_storage::{KvStore, ScopedKvStore};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Namespace holding secret key bytes.
pub const KEYS_NAMESPACE: &str = "kms:local";

/// Creates and hands out Ed25519 signing keys by id.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Create a new signing key, returning its id and public key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyGeneration`] if the key cannot be created or
    /// persisted.
    async fn create_signing_key(&self) -> VaultResult<(String, PublicKey)>;

    /// Load a signing key by id.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotFound`] for an unknown id.
    async fn signing_key(&self, kid: &str) -> VaultResult<Arc<KeyPair>>;
}

/// Key id of a public key: base64url of its SHA-256 digest.
#[must_use]
pub fn key_id(public_key: &PublicKey) -> String {
    encode_b64url(Sha256::digest(public_key.as_bytes()))
}

/// [`KeyManager`] backed by a [`KvStore`].
#[derive(Debug, Clone)]
pub struct LocalKeyManager {
    store: ScopedKvStore,
}

impl LocalKeyManager {
    /// Keep keys in the [`KEYS_NAMESPACE`] namespace of `store`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::LocalStore`] if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>) -> VaultResult<Self> {
        Ok(Self {
            store: ScopedKvStore::new(store, KEYS_NAMESPACE)?,
        })
    }
}

#[async_trait]
impl KeyManager for LocalKeyManager {
    async fn create_signing_key(&self) -> VaultResult<(String, PublicKey)> {
        let keypair = KeyPair::generate();
        let public_key = keypair.export_public_key();
        let kid = key_id(&public_key);

        let secret = Zeroizing::new(keypair.secret_key_bytes());
        let created = self
            .store
            .set_if_absent(&kid, secret.to_vec())
            .await
            .map_err(|e| VaultError::KeyGeneration(e.to_string()))?;
        if !created {
            return Err(VaultError::KeyGeneration(format!(
                "key id {kid} already in use"
            )));
        }

        tracing::debug!(kid = %kid, "created signing key");
        Ok((kid, public_key))
    }

    async fn signing_key(&self, kid: &str) -> VaultResult<Arc<KeyPair>> {
        let secret = self
            .store
            .get(kid)
            .await?
            .map(Zeroizing::new)
            .ok_or_else(|| VaultError::NotFound(format!("signing key {kid}")))?;
        let keypair = KeyPair::from_secret_key(&secret)?;
        Ok(Arc::new(keypair))
    }
}
