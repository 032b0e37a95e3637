//! Vault identities.
//!
//! A vault is named by the `did:key` of its signing key. The DID is
//! self-certifying: anyone holding it can recover the public key and check
//! signatures made by the vault without a registry lookup.

use vcvault_crypto::{DidKey, PublicKey};

use crate::error::{VaultError, VaultResult};
use crate::keys::KeyManager;

/// A freshly derived vault identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// `did:key:z…`; doubles as the vault id.
    pub did: String,
    /// `did:key:z…#z…`, used as the signer of capabilities and requests.
    pub verification_method: String,
    /// Key-manager id of the signing key.
    pub key_id: String,
}

impl Identity {
    /// The identity of `public_key`, stored under `key_id`.
    #[must_use]
    pub fn from_public_key(key_id: impl Into<String>, public_key: &PublicKey) -> Self {
        let did = DidKey::from_public_key(public_key);
        Self {
            did: did.did(),
            verification_method: did.verification_method(),
            key_id: key_id.into(),
        }
    }
}

/// Create a signing key and derive its identity.
///
/// # Errors
///
/// Returns [`VaultError::KeyGeneration`] if the key manager cannot produce a
/// key.
pub async fn derive_identity(keys: &dyn KeyManager) -> VaultResult<Identity> {
    let (key_id, public_key) = keys.create_signing_key().await.map_err(|e| match e {
        VaultError::KeyGeneration(_) => e,
        other => VaultError::KeyGeneration(other.to_string()),
    })?;
    Ok(Identity::from_public_key(key_id, &public_key))
}

/// Canonical verification-method URL for a `did:key` or an existing DID URL.
///
/// # Errors
///
/// Returns [`VaultError::Validation`] if `did` is not an Ed25519 `did:key`.
pub fn to_did_url(did: &str) -> VaultResult<String> {
    DidKey::parse(did)
        .map(|d| d.verification_method())
        .map_err(|e| VaultError::Validation(format!("{did:?} is not a did:key: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::keys::LocalKeyManager;
    use vcvault_crypto::KeyPair;
    use vcvault_storage::MemoryKvStore;

    #[test]
    fn test_identity_is_deterministic() {
        let public_key = KeyPair::generate().export_public_key();
        let a = Identity::from_public_key("k", &public_key);
        let b = Identity::from_public_key("k", &public_key);
        assert_eq!(a, b);
        assert!(a.did.starts_with("did:key:z6Mk"));
        assert_eq!(
            a.verification_method,
            format!("{}#{}", a.did, a.did.trim_start_matches("did:key:"))
        );
    }

    #[tokio::test]
    async fn test_derive_identity_uses_key_manager() {
        let keys = LocalKeyManager::new(Arc::new(MemoryKvStore::new())).unwrap();
        let identity = derive_identity(&keys).await.unwrap();

        let keypair = keys.signing_key(&identity.key_id).await.unwrap();
        assert_eq!(
            identity.did,
            DidKey::from_public_key(&keypair.export_public_key()).did()
        );
    }

    #[test]
    fn test_to_did_url() {
        let did = DidKey::from_public_key(&KeyPair::generate().export_public_key());
        assert_eq!(to_did_url(&did.did()).unwrap(), did.verification_method());
        assert_eq!(
            to_did_url(&did.verification_method()).unwrap(),
            did.verification_method()
        );
    }

    #[test]
    fn test_to_did_url_rejects_garbage() {
        for input in ["", "did:web:example.com", "did:key:zNotBase58!", "did:key:z6Mk"] {
            assert_eq!(to_did_url(input).unwrap_err().kind(), ErrorKind::Validation);
        }
    }
}
