//! Encrypted document storage.
//!
//! Each document gets its own KMS key the first time it is saved. Content is
//! canonicalised (RFC 8785), sealed to that key on the client and stored in
//! the vault's EDV under a random EDV id, so neither service sees plaintext
//! and the EDV never sees the caller's document id.

use serde::Serialize;
use tracing::{debug, info, warn};
use vcvault_crypto::{CryptoError, Envelope};
use vcvault_remote::edv::{document_uri, generate_document_id};
use vcvault_remote::{Authority, EncryptedDocument, RemoteError};

use crate::client::VaultClient;
use crate::error::{VaultError, VaultResult, VaultResultExt};
use crate::model::{DocMetaInfo, DocumentMetadata, VaultInfo};

/// The vault's own authorities over its key store and data vault.
struct VaultAuthorities {
    kms: Authority,
    edv: Authority,
}

impl VaultClient {
    async fn authorities(&self, info: &VaultInfo) -> VaultResult<VaultAuthorities> {
        let controller = self.controller(&info.signing_key_id).await?;
        Ok(VaultAuthorities {
            kms: Authority::new(controller.clone(), info.authorization.kms.auth_token.clone()),
            edv: Authority::new(controller, info.authorization.edv.auth_token.clone()),
        })
    }

    /// Existing metadata for the document, or a new record with a fresh KMS
    /// key and EDV id. Concurrent first saves agree on whichever record was
    /// stored first.
    async fn doc_meta_or_create(
        &self,
        vault_id: &str,
        doc_id: &str,
        info: &VaultInfo,
        kms: &Authority,
    ) -> VaultResult<DocMetaInfo> {
        if let Some(meta) = self
            .store
            .doc_meta(vault_id, doc_id)
            .await
            .context("get doc metadata")?
        {
            return Ok(meta);
        }

        let key_uri = self
            .kms
            .create_key(&info.authorization.kms.uri, kms)
            .await
            .map_err(VaultError::KeyIssuance)
            .context("create key")?;
        let fresh = DocMetaInfo {
            edv_doc_id: generate_document_id(),
            key_uri,
        };
        debug!(edv_doc_id = %fresh.edv_doc_id, key = %fresh.key_uri, "assigned document key");

        if self
            .store
            .create_doc_meta(vault_id, doc_id, &fresh)
            .await
            .context("save doc metadata")?
        {
            return Ok(fresh);
        }

        warn!(key = %fresh.key_uri, "concurrent first save; using stored document metadata");
        self.store
            .doc_meta(vault_id, doc_id)
            .await
            .context("get doc metadata")?
            .ok_or_else(|| VaultError::NotFound(format!("document {doc_id} of vault {vault_id}")))
    }

    async fn stored_doc_meta(&self, vault_id: &str, doc_id: &str) -> VaultResult<DocMetaInfo> {
        self.store
            .doc_meta(vault_id, doc_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("document {doc_id} of vault {vault_id}")))
    }

    /// Encrypt `content` and store it under `doc_id`, creating or replacing
    /// the document.
    ///
    /// The first save of a `doc_id` fixes its EDV id and KMS key; later saves
    /// reuse both.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the vault is unknown
    /// - [`VaultError::KeyIssuance`] or [`VaultError::Crypto`] if the content
    ///   key cannot be obtained or the content cannot be sealed
    /// - [`VaultError::DocumentWrite`] if the EDV rejects the document, and
    ///   [`VaultError::Remote`] or [`VaultError::LocalStore`] if any other
    ///   storage step fails
    #[tracing::instrument(skip(self, content))]
    pub async fn save_doc<T: Serialize>(
        &self,
        vault_id: &str,
        doc_id: &str,
        content: &T,
    ) -> VaultResult<DocumentMetadata> {
        let info = self
            .store
            .vault_info(vault_id)
            .await
            .context("get vault info")?;
        let authorities = self.authorities(&info).await.context("get signing key")?;
        let meta = self
            .doc_meta_or_create(vault_id, doc_id, &info, &authorities.kms)
            .await?;

        let public_key = self
            .kms
            .export_public_key(&meta.key_uri, &authorities.kms)
            .await
            .map_err(VaultError::KeyIssuance)
            .context("export key")?;
        let plaintext = serde_jcs::to_vec(content)
            .map_err(|e| VaultError::Encoding(e.to_string()))
            .context("canonicalize content")?;
        let document = EncryptedDocument {
            id: meta.edv_doc_id.clone(),
            sequence: 0,
            jwe: Envelope::seal(&plaintext, &meta.key_uri, &public_key)
                .context("encrypt document")?,
        };

        let vault_uri = &info.authorization.edv.uri;
        let uri = match self
            .edv
            .create_document(vault_uri, &document, &authorities.edv)
            .await
        {
            Ok(uri) => uri,
            Err(RemoteError::DuplicateDocument { .. }) => {
                warn!(edv_doc_id = %document.id, "document exists; updating instead");
                self.edv
                    .update_document(vault_uri, &document, &authorities.edv)
                    .await
                    .map_err(|source| VaultError::DocumentWrite {
                        doc_id: doc_id.to_string(),
                        source,
                    })
                    .context("update document")?;
                document_uri(vault_uri, &document.id)
            },
            Err(source) => {
                return Err(VaultError::DocumentWrite {
                    doc_id: doc_id.to_string(),
                    source,
                }
                .context("create document"));
            },
        };

        info!("document saved");
        Ok(DocumentMetadata {
            doc_id: doc_id.to_string(),
            document_uri: uri,
            key_uri: meta.key_uri,
        })
    }

    /// Where a saved document lives, after confirming the EDV still has it.
    ///
    /// # Errors
    ///
    /// Returns an error of kind [`NotFound`](crate::ErrorKind::NotFound) if
    /// the vault or document is unknown locally or the EDV read fails.
    #[tracing::instrument(skip(self))]
    pub async fn get_doc_metadata(
        &self,
        vault_id: &str,
        doc_id: &str,
    ) -> VaultResult<DocumentMetadata> {
        let info = self
            .store
            .vault_info(vault_id)
            .await
            .context("get vault info")?;
        let meta = self
            .stored_doc_meta(vault_id, doc_id)
            .await
            .context("get doc metadata")?;
        let authorities = self.authorities(&info).await.context("get signing key")?;

        let vault_uri = &info.authorization.edv.uri;
        self.edv
            .read_document(vault_uri, &meta.edv_doc_id, &authorities.edv)
            .await
            .map_err(|source| VaultError::DocumentUnavailable {
                doc_id: doc_id.to_string(),
                source,
            })
            .context("read document")?;

        Ok(DocumentMetadata {
            doc_id: doc_id.to_string(),
            document_uri: document_uri(vault_uri, &meta.edv_doc_id),
            key_uri: meta.key_uri,
        })
    }

    /// Fetch and decrypt a saved document.
    ///
    /// # Errors
    ///
    /// - an error of kind [`NotFound`](crate::ErrorKind::NotFound) if the
    ///   vault or document is unknown or the EDV read fails
    /// - [`VaultError::Crypto`] if the envelope has no entry for the
    ///   document key or does not decrypt
    /// - [`VaultError::Encoding`] if the plaintext is not JSON
    #[tracing::instrument(skip(self))]
    pub async fn read_doc(&self, vault_id: &str, doc_id: &str) -> VaultResult<serde_json::Value> {
        let info = self
            .store
            .vault_info(vault_id)
            .await
            .context("get vault info")?;
        let meta = self
            .stored_doc_meta(vault_id, doc_id)
            .await
            .context("get doc metadata")?;
        let authorities = self.authorities(&info).await.context("get signing key")?;

        let document = self
            .edv
            .read_document(&info.authorization.edv.uri, &meta.edv_doc_id, &authorities.edv)
            .await
            .map_err(|source| VaultError::DocumentUnavailable {
                doc_id: doc_id.to_string(),
                source,
            })
            .context("read document")?;

        let recipient = document.jwe.recipient(&meta.key_uri).ok_or_else(|| {
            VaultError::Crypto(CryptoError::InvalidEnvelope(format!(
                "no recipient for {}",
                meta.key_uri
            )))
        })?;
        let cek = self
            .kms
            .unwrap_key(&meta.key_uri, recipient, &authorities.kms)
            .await
            .map_err(VaultError::KeyIssuance)
            .context("unwrap key")?;
        let plaintext = document.jwe.open(&cek).context("decrypt document")?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::Encoding(format!("document {doc_id} is not JSON: {e}")))
    }
}
