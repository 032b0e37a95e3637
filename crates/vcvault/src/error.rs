//! Vault client error types.
//!
//! Lower crates keep their own error enums; this module folds them into one
//! [`VaultError`] and classifies every failure with an [`ErrorKind`].

use std::fmt;

use thiserror::Error;
use vcvault_capabilities::CapabilityError;
use vcvault_crypto::CryptoError;
use vcvault_remote::RemoteError;
use vcvault_storage::StorageError;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A vault, document or authorization does not exist.
    NotFound,
    /// Caller input was rejected.
    Validation,
    /// A capability could not be parsed, delegated, signed or compressed.
    Capability,
    /// Key issuance, sealing or opening failed.
    Encryption,
    /// Local or remote storage failed.
    Storage,
    /// A request could not be signed or a signature was rejected.
    Signing,
    /// The key manager could not produce a key.
    KeyGeneration,
    /// A value could not be encoded.
    Encoding,
    /// The client configuration is invalid.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Validation => "validation",
            Self::Capability => "capability",
            Self::Encryption => "encryption",
            Self::Storage => "storage",
            Self::Signing => "signing",
            Self::KeyGeneration => "key generation",
            Self::Encoding => "encoding",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

/// Errors returned by the vault client.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller input was rejected.
    #[error("validation error: {0}")]
    Validation(String),

    /// Capability error.
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// KMS or EDV call failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Local metadata store failed.
    #[error("local store error: {0}")]
    LocalStore(#[from] StorageError),

    /// The KMS could not issue or export a content key.
    #[error("key issuance failed: {0}")]
    KeyIssuance(#[source] RemoteError),

    /// The EDV could not produce a document the client has metadata for.
    #[error("document {doc_id} unavailable: {source}")]
    DocumentUnavailable {
        /// Caller-chosen document id.
        doc_id: String,
        /// The failed EDV read.
        source: RemoteError,
    },

    /// The EDV refused to create or update a document.
    #[error("document {doc_id} not stored: {source}")]
    DocumentWrite {
        /// Caller-chosen document id.
        doc_id: String,
        /// The failed EDV write.
        source: RemoteError,
    },

    /// Signing error.
    #[error("signing error: {0}")]
    Signing(String),

    /// Key generation error.
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    /// Encoding error.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error wrapped with the operation or stage it happened in.
    #[error("{operation}: {source}")]
    Context {
        /// Operation or stage name, e.g. `create key store`.
        operation: String,
        /// The underlying error.
        source: Box<VaultError>,
    },
}

impl VaultError {
    /// Classify this error, looking through any [`VaultError::Context`]
    /// wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::DocumentUnavailable { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Capability(_) => ErrorKind::Capability,
            Self::Crypto(_) | Self::KeyIssuance(_) => ErrorKind::Encryption,
            Self::Remote(remote) => match remote {
                RemoteError::Signing(_) | RemoteError::InvalidSignature(_) => ErrorKind::Signing,
                _ => ErrorKind::Storage,
            },
            Self::LocalStore(_) | Self::DocumentWrite { .. } => ErrorKind::Storage,
            Self::Signing(_) => ErrorKind::Signing,
            Self::KeyGeneration(_) => ErrorKind::KeyGeneration,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Config(_) => ErrorKind::Config,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Whether this error means the requested record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Wrap this error with an operation name.
    #[must_use]
    pub fn context(self, operation: impl Into<String>) -> Self {
        Self::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }
}

/// Result type for vault client operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Attach an operation name to the error of a result.
pub trait VaultResultExt<T> {
    /// Wrap the error, if any, in [`VaultError::Context`].
    ///
    /// # Errors
    ///
    /// Returns the wrapped error when `self` is `Err`.
    fn context(self, operation: &str) -> VaultResult<T>;
}

impl<T, E: Into<VaultError>> VaultResultExt<T> for Result<T, E> {
    fn context(self, operation: &str) -> VaultResult<T> {
        self.map_err(|e| e.into().context(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_walks_context_chain() {
        let err = VaultError::NotFound("vault did:key:z6Mk".into())
            .context("get vault info")
            .context("create authorization");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "create authorization: get vault info: not found: vault did:key:z6Mk"
        );
    }

    #[test]
    fn test_remote_errors_are_classified() {
        // A missing remote collection is a storage failure, not a missing record.
        let not_found = VaultError::from(RemoteError::NotFound {
            endpoint: "GET /x".into(),
        });
        assert_eq!(not_found.kind(), ErrorKind::Storage);

        let signing = VaultError::from(RemoteError::Signing("bad header".into()));
        assert_eq!(signing.kind(), ErrorKind::Signing);

        let api = VaultError::from(RemoteError::Api {
            endpoint: "POST /kms/keystores".into(),
            status: 500,
            body: String::new(),
        });
        assert_eq!(api.kind(), ErrorKind::Storage);

        let issuance = VaultError::KeyIssuance(RemoteError::Api {
            endpoint: "POST /keys".into(),
            status: 500,
            body: String::new(),
        });
        assert_eq!(issuance.kind(), ErrorKind::Encryption);
    }

    #[test]
    fn test_document_errors_are_classified() {
        let gone = || RemoteError::NotFound {
            endpoint: "POST /encrypted-data-vaults/gone/documents".into(),
        };
        let write = VaultError::DocumentWrite {
            doc_id: "passport".into(),
            source: gone(),
        }
        .context("create document");
        assert_eq!(write.kind(), ErrorKind::Storage);
        assert!(!write.is_not_found());
        assert!(write.to_string().starts_with("create document: document passport not stored"));

        let read = VaultError::DocumentUnavailable {
            doc_id: "passport".into(),
            source: gone(),
        }
        .context("read document");
        assert_eq!(read.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_result_ext_converts_lower_errors() {
        let result: Result<(), StorageError> = Err(StorageError::Internal("disk full".into()));
        let err = result.context("save vault info").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().starts_with("save vault info: "));
    }
}
