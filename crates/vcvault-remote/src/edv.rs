//! Client for the remote encrypted data vault.
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | POST   | `/encrypted-data-vaults` | (bootstrap) |
//! | POST   | `<vault>/documents` | `write` |
//! | GET    | `<vault>/documents/<id>` | `read` |
//! | POST   | `<vault>/documents/<id>` | `write` |
//!
//! The EDV only ever sees [`Envelope`]s; content is sealed and opened on the
//! client.

use rand::RngCore;
use rand::rngs::OsRng;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use vcvault_capabilities::{Capability, vault_action};
use vcvault_crypto::Envelope;

use crate::error::{RemoteError, RemoteResult};
use crate::signer::{Authority, Controller};
use crate::transport::{endpoint, ensure_success, expect_json, join, send_signed};

/// Path of the vault collection.
pub const VAULTS_PATH: &str = "/encrypted-data-vaults";

/// Key-encryption-key type announced on vault creation.
pub const KEK_TYPE: &str = "AesKeyWrappingKey2019";

/// HMAC key type announced on vault creation.
pub const HMAC_TYPE: &str = "Sha256HmacKey2019";

/// A typed key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTypePair {
    /// Key id.
    pub id: String,
    /// Key type.
    #[serde(rename = "type")]
    pub key_type: String,
}

/// Vault creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVaultConfiguration {
    /// Configuration sequence number.
    pub sequence: u64,
    /// DID of the vault controller.
    pub controller: String,
    /// Caller-chosen reference id.
    pub reference_id: String,
    /// Key-encryption-key reference.
    pub kek: IdTypePair,
    /// HMAC key reference.
    pub hmac: IdTypePair,
}

impl DataVaultConfiguration {
    /// A fresh configuration for `controller` with new key references.
    #[must_use]
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            controller: controller.into(),
            reference_id: Uuid::new_v4().to_string(),
            kek: IdTypePair {
                id: Uuid::new_v4().urn().to_string(),
                key_type: KEK_TYPE.to_string(),
            },
            hmac: IdTypePair {
                id: Uuid::new_v4().urn().to_string(),
                key_type: HMAC_TYPE.to_string(),
            },
        }
    }
}

/// A document as stored in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDocument {
    /// EDV document id.
    pub id: String,
    /// Document sequence number.
    #[serde(default)]
    pub sequence: u64,
    /// Encrypted content.
    pub jwe: Envelope,
}

/// Result of vault creation.
#[derive(Debug, Clone)]
pub struct CreatedDataVault {
    /// `Location` header of the new vault, resolved against the EDV root.
    pub location: String,
    /// Bootstrap capability returned by the EDV.
    pub capability: Capability,
}

/// A fresh EDV-compatible document id: base58 of 16 random bytes.
#[must_use]
pub fn generate_document_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bs58::encode(bytes).into_string()
}

/// Canonical vault URI for a vault location:
/// `<scheme>://<host>[:port]/encrypted-data-vaults/<last path segment>`.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidUrl`] if the location has no host or no
/// path segment.
pub fn vault_uri(location: &str) -> RemoteResult<String> {
    let url = Url::parse(location).map_err(|e| RemoteError::InvalidUrl(format!("{location}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| RemoteError::InvalidUrl(format!("{location}: no host")))?;
    let id = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .ok_or_else(|| RemoteError::InvalidUrl(format!("{location}: no vault id")))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}{VAULTS_PATH}/{id}", url.scheme()),
        None => format!("{}://{host}{VAULTS_PATH}/{id}", url.scheme()),
    })
}

/// URI of a document inside a vault.
#[must_use]
pub fn document_uri(vault_uri: &str, edv_id: &str) -> String {
    format!("{}/documents/{edv_id}", vault_uri.trim_end_matches('/'))
}

/// Typed client for the EDV.
#[derive(Debug, Clone)]
pub struct EdvClient {
    http: Client,
    base_url: Url,
}

impl EdvClient {
    /// Create a client for the EDV server rooted at `base_url`.
    #[must_use]
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The EDV root URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create a vault controlled by `controller`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidResponse`] if the `Location` header is
    /// missing, or any transport, status or decode failure.
    pub async fn create_data_vault(
        &self,
        controller: &Controller,
        config: &DataVaultConfiguration,
    ) -> RemoteResult<CreatedDataVault> {
        let url = join(self.base_url.as_str(), VAULTS_PATH)?;
        let endpoint = endpoint("POST", &url);

        let resp = send_signed(
            &self.http,
            self.http.post(url.clone()).json(config),
            controller,
            None,
            &endpoint,
        )
        .await?;
        let resp = ensure_success(resp, &endpoint).await?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RemoteError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: "missing Location header".into(),
            })?;
        let location = url
            .join(location)
            .map_err(|e| RemoteError::InvalidUrl(format!("{location}: {e}")))?
            .to_string();

        let capability: Capability =
            resp.json()
                .await
                .map_err(|source| RemoteError::Deserialization {
                    endpoint: endpoint.clone(),
                    source,
                })?;

        Ok(CreatedDataVault {
            location,
            capability,
        })
    }

    /// Store a new document.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::DuplicateDocument`] if the id is taken, or
    /// any transport or status failure.
    pub async fn create_document(
        &self,
        vault_uri: &str,
        document: &EncryptedDocument,
        authority: &Authority,
    ) -> RemoteResult<String> {
        let url = join(vault_uri, "documents")?;
        let endpoint = endpoint("POST", &url);

        let invocation = authority.invocation(vault_action("POST"));
        let resp = send_signed(
            &self.http,
            self.http.post(url).json(document),
            &authority.controller,
            Some(&invocation),
            &endpoint,
        )
        .await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(RemoteError::DuplicateDocument { endpoint });
        }
        ensure_success(resp, &endpoint).await?;
        Ok(document_uri(vault_uri, &document.id))
    }

    /// Fetch a document.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the vault has no such document,
    /// or any transport, status or decode failure.
    pub async fn read_document(
        &self,
        vault_uri: &str,
        edv_id: &str,
        authority: &Authority,
    ) -> RemoteResult<EncryptedDocument> {
        let url = join(vault_uri, &format!("documents/{edv_id}"))?;
        let endpoint = endpoint("GET", &url);

        let invocation = authority.invocation(vault_action("GET"));
        let resp = send_signed(
            &self.http,
            self.http.get(url),
            &authority.controller,
            Some(&invocation),
            &endpoint,
        )
        .await?;
        expect_json(resp, &endpoint).await
    }

    /// Overwrite an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::NotFound`] if the document does not exist, or
    /// any transport or status failure.
    pub async fn update_document(
        &self,
        vault_uri: &str,
        document: &EncryptedDocument,
        authority: &Authority,
    ) -> RemoteResult<()> {
        let url = join(vault_uri, &format!("documents/{}", document.id))?;
        let endpoint = endpoint("POST", &url);

        let invocation = authority.invocation(vault_action("POST"));
        let resp = send_signed(
            &self.http,
            self.http.post(url).json(document),
            &authority.controller,
            Some(&invocation),
            &endpoint,
        )
        .await?;
        ensure_success(resp, &endpoint).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_uri_rebuilt_from_location() {
        assert_eq!(
            vault_uri("https://edv.example.com/some/prefix/z19uMCiPNET4YbcPpBcab5mEE").unwrap(),
            "https://edv.example.com/encrypted-data-vaults/z19uMCiPNET4YbcPpBcab5mEE"
        );
        assert_eq!(
            vault_uri("http://127.0.0.1:8081/encrypted-data-vaults/v1/").unwrap(),
            "http://127.0.0.1:8081/encrypted-data-vaults/v1"
        );
    }

    #[test]
    fn test_vault_uri_requires_id() {
        assert!(vault_uri("https://edv.example.com/").is_err());
        assert!(vault_uri("/encrypted-data-vaults/v1").is_err());
    }

    #[test]
    fn test_document_uri() {
        assert_eq!(
            document_uri("https://edv.example.com/encrypted-data-vaults/v1/", "abc"),
            "https://edv.example.com/encrypted-data-vaults/v1/documents/abc"
        );
    }

    #[test]
    fn test_generated_ids_are_base58_of_16_bytes() {
        let id = generate_document_id();
        assert_eq!(bs58::decode(&id).into_vec().unwrap().len(), 16);
        assert_ne!(id, generate_document_id());
    }

    #[test]
    fn test_configuration_wire_format() {
        let config = DataVaultConfiguration::new("did:key:z6MkController");
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["sequence"], 0);
        assert_eq!(value["controller"], "did:key:z6MkController");
        assert_eq!(value["kek"]["type"], KEK_TYPE);
        assert_eq!(value["hmac"]["type"], HMAC_TYPE);
        assert!(value["kek"]["id"].as_str().unwrap().starts_with("urn:uuid:"));
        assert!(Uuid::parse_str(value["referenceId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_configurations_are_fresh() {
        let a = DataVaultConfiguration::new("did:key:z6Mk");
        let b = DataVaultConfiguration::new("did:key:z6Mk");
        assert_ne!(a.reference_id, b.reference_id);
        assert_ne!(a.kek.id, b.kek.id);
    }
}
