//! vcvault Crypto - Cryptographic primitives for the vault client.
//!
//! This crate provides:
//! - Ed25519 key pairs and signatures (capability proofs, HTTP request signing)
//! - `did:key` identities derived from Ed25519 public keys
//! - A JWE-style envelope that encrypts document content client-side and
//!   wraps the content key to an X25519 recipient key
//!
//! # Example
//!
//! ```
//! use vcvault_crypto::{DidKey, KeyPair};
//!
//! let keypair = KeyPair::generate();
//! let did = DidKey::from_public_key(&keypair.export_public_key());
//!
//! assert!(did.did().starts_with("did:key:z"));
//!
//! let signature = keypair.sign(b"important data");
//! assert!(did.public_key().verify(b"important data", &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod encoding;
pub mod prelude;

mod did;
mod envelope;
mod error;
mod keypair;
mod signature;

pub use did::{DID_KEY_PREFIX, DidKey};
pub use envelope::{
    CONTENT_ENCRYPTION, ContentKey, EphemeralKey, Envelope, KEY_WRAP_ALGORITHM, Recipient,
    RecipientHeader, X25519Secret,
};
pub use error::{CryptoError, CryptoResult};
pub use keypair::{KeyPair, PublicKey};
pub use signature::Signature;
