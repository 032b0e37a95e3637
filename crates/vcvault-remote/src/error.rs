//! Errors returned by the remote KMS and EDV clients.

use thiserror::Error;

/// Errors from remote service calls and request signing.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request could not be sent or no response was received.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        /// `METHOD path` of the call.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        /// `METHOD path` of the call.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The requested resource does not exist.
    #[error("{endpoint}: not found")]
    NotFound {
        /// `METHOD path` of the call.
        endpoint: String,
    },

    /// The EDV already holds a document with this id.
    #[error("{endpoint}: duplicate document")]
    DuplicateDocument {
        /// `METHOD path` of the call.
        endpoint: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response from {endpoint}: {source}")]
    Deserialization {
        /// `METHOD path` of the call.
        endpoint: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// The response decoded but is missing or has malformed fields.
    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// `METHOD path` of the call.
        endpoint: String,
        /// What was wrong.
        reason: String,
    },

    /// An outgoing request could not be signed.
    #[error("request signing failed: {0}")]
    Signing(String),

    /// An incoming request's signature did not verify.
    #[error("invalid request signature: {0}")]
    InvalidSignature(String),

    /// A URL could not be built or parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
