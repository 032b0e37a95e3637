//! Capability-related error types.

use thiserror::Error;

/// Errors that can occur while encoding, delegating or verifying capabilities.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The compressed form could not be produced or read.
    #[error("capability encoding error: {0}")]
    EncodingError(String),

    /// JSON (or canonical JSON) serialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The capability carries no proof.
    #[error("capability {id} has no proof")]
    MissingProof {
        /// Capability id.
        id: String,
    },

    /// The proof is malformed or has the wrong type or purpose.
    #[error("invalid capability proof: {0}")]
    InvalidProof(String),

    /// The proof signature does not verify.
    #[error("invalid capability signature")]
    InvalidSignature,

    /// A requested action is outside the parent capability's actions.
    #[error("action '{action}' is not allowed by parent capability {parent}")]
    ActionNotAllowed {
        /// The rejected action.
        action: String,
        /// The parent capability id.
        parent: String,
    },

    /// The delegation request itself is malformed.
    #[error("invalid delegation: {0}")]
    InvalidDelegation(String),

    /// The capability-invocation header could not be parsed.
    #[error("invalid invocation header: {0}")]
    InvalidInvocation(String),

    /// Crypto error.
    #[error("crypto error: {0}")]
    CryptoError(#[from] vcvault_crypto::CryptoError),
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;
