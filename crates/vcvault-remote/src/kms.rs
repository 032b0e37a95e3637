//! Client for the remote key-management service.
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | POST   | `/kms/keystores` | (bootstrap) |
//! | POST   | `<keystore>/keys` | `createKey` |
//! | GET    | `<key>/export` | `exportKey` |
//! | POST   | `<key>/unwrap` | `unwrap` |
//!
//! The KMS may answer with URLs relative to its own root (`/kms/…`); they
//! are resolved against the configured base URL before being handed out.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;
use vcvault_capabilities::{Invocation, actions};
use vcvault_crypto::encoding::decode_b64url;
use vcvault_crypto::{ContentKey, Recipient};

use crate::error::{RemoteError, RemoteResult};
use crate::signer::{Authority, Controller};
use crate::transport::{endpoint, expect_json, join, send_signed};

/// Path of the key store collection.
pub const KEYSTORES_PATH: &str = "/kms/keystores";

/// Key type requested for document content keys.
pub const CONTENT_KEY_TYPE: &str = "X25519ECDHKW";

/// Action a KMS request path invokes, judged by its last segment.
#[must_use]
pub fn kms_action(path: &str) -> Option<&'static str> {
    match path.trim_end_matches('/').rsplit('/').next()? {
        "keys" => Some(actions::CREATE_KEY),
        "export" => Some(actions::EXPORT_KEY),
        "unwrap" => Some(actions::UNWRAP),
        _ => None,
    }
}

/// The invocation of `authority` for the operation `url` names.
fn invocation_for(url: &Url, authority: &Authority) -> RemoteResult<Invocation> {
    let action = kms_action(url.path())
        .ok_or_else(|| RemoteError::InvalidUrl(format!("{url} names no KMS operation")))?;
    Ok(authority.invocation(action))
}

/// A freshly created key store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    /// Absolute key store URL.
    pub url: String,
    /// Compressed bootstrap capability for the key store.
    pub capability: String,
}

/// `POST /kms/keystores` request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyStoreRequest {
    /// DID of the key store controller.
    pub controller: String,
}

/// `POST /kms/keystores` response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyStoreResponse {
    /// Key store URL, possibly relative to the KMS root.
    #[serde(rename = "keyStoreURL")]
    pub key_store_url: String,
    /// Compressed bootstrap capability.
    pub capability: String,
}

/// `POST <keystore>/keys` request body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    /// Requested key type.
    pub key_type: String,
}

/// `POST <keystore>/keys` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyResponse {
    /// Key URL, possibly relative to the KMS root.
    #[serde(rename = "keyURL")]
    pub key_url: String,
}

/// `GET <key>/export` response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportKeyResponse {
    /// Base64url public key bytes.
    pub public_key: String,
}

/// `POST <key>/unwrap` request body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnwrapKeyRequest {
    /// The envelope recipient entry addressed to the key.
    pub wrapped_key: Recipient,
}

/// `POST <key>/unwrap` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct UnwrapKeyResponse {
    /// Base64url content key.
    pub key: String,
}

/// Typed client for the KMS.
#[derive(Debug, Clone)]
pub struct KmsClient {
    http: Client,
    base_url: Url,
}

impl KmsClient {
    /// Create a client for the KMS rooted at `base_url`.
    #[must_use]
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The KMS root URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a KMS URL: paths starting with `/` are prefixed with the base
    /// URL, anything else must already be absolute.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] if the result does not parse.
    pub fn resolve(&self, uri: &str) -> RemoteResult<String> {
        let resolved = if uri.starts_with('/') {
            format!("{}{uri}", self.base_url.as_str().trim_end_matches('/'))
        } else {
            uri.to_string()
        };
        Url::parse(&resolved).map_err(|e| RemoteError::InvalidUrl(format!("{resolved}: {e}")))?;
        Ok(resolved)
    }

    /// Create a key store controlled by `controller`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport, status, decode or URL failures.
    pub async fn create_key_store(&self, controller: &Controller) -> RemoteResult<KeyStore> {
        let url = join(self.base_url.as_str(), KEYSTORES_PATH)?;
        let endpoint = endpoint("POST", &url);
        let body = CreateKeyStoreRequest {
            controller: controller.did().did(),
        };

        let resp = send_signed(
            &self.http,
            self.http.post(url).json(&body),
            controller,
            None,
            &endpoint,
        )
        .await?;
        let created: CreateKeyStoreResponse = expect_json(resp, &endpoint).await?;

        if created.capability.is_empty() {
            return Err(RemoteError::InvalidResponse {
                endpoint,
                reason: "missing capability".into(),
            });
        }
        Ok(KeyStore {
            url: self.resolve(&created.key_store_url)?,
            capability: created.capability,
        })
    }

    /// Create a content key in a key store, returning its absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport, status, decode or URL failures.
    pub async fn create_key(&self, keystore_url: &str, authority: &Authority) -> RemoteResult<String> {
        let url = join(keystore_url, "keys")?;
        let endpoint = endpoint("POST", &url);
        let body = CreateKeyRequest {
            key_type: CONTENT_KEY_TYPE.to_string(),
        };

        let invocation = invocation_for(&url, authority)?;
        let resp = send_signed(
            &self.http,
            self.http.post(url).json(&body),
            &authority.controller,
            Some(&invocation),
            &endpoint,
        )
        .await?;
        let created: CreateKeyResponse = expect_json(resp, &endpoint).await?;
        self.resolve(&created.key_url)
    }

    /// Export the public half of a content key.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidResponse`] if the key is not 32 bytes of
    /// base64url, or any transport/status error.
    pub async fn export_public_key(
        &self,
        key_url: &str,
        authority: &Authority,
    ) -> RemoteResult<[u8; 32]> {
        let url = join(key_url, "export")?;
        let endpoint = endpoint("GET", &url);

        let invocation = invocation_for(&url, authority)?;
        let resp = send_signed(
            &self.http,
            self.http.get(url),
            &authority.controller,
            Some(&invocation),
            &endpoint,
        )
        .await?;
        let exported: ExportKeyResponse = expect_json(resp, &endpoint).await?;

        decode_b64url(&exported.public_key)
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| RemoteError::InvalidResponse {
                endpoint,
                reason: "publicKey is not a 32-byte base64url value".into(),
            })
    }

    /// Ask the KMS to unwrap a content key addressed to `key_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidResponse`] if the returned key is
    /// malformed, or any transport/status error.
    pub async fn unwrap_key(
        &self,
        key_url: &str,
        wrapped: &Recipient,
        authority: &Authority,
    ) -> RemoteResult<ContentKey> {
        let url = join(key_url, "unwrap")?;
        let endpoint = endpoint("POST", &url);
        let body = UnwrapKeyRequest {
            wrapped_key: wrapped.clone(),
        };

        let invocation = invocation_for(&url, authority)?;
        let resp = send_signed(
            &self.http,
            self.http.post(url).json(&body),
            &authority.controller,
            Some(&invocation),
            &endpoint,
        )
        .await?;
        let unwrapped: UnwrapKeyResponse = expect_json(resp, &endpoint).await?;

        decode_b64url(&unwrapped.key)
            .ok()
            .and_then(|bytes| ContentKey::from_bytes(&bytes).ok())
            .ok_or_else(|| RemoteError::InvalidResponse {
                endpoint,
                reason: "key is not a 32-byte base64url value".into(),
            })
    }
}
