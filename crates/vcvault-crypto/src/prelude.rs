//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vcvault_crypto::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use vcvault_crypto::prelude::*;
//!
//! let keypair = KeyPair::generate();
//! let did = DidKey::from_public_key(&keypair.export_public_key());
//! assert!(DidKey::parse(&did.verification_method()).is_ok());
//! ```

// Errors
pub use crate::{CryptoError, CryptoResult};

// Identity
pub use crate::{DidKey, KeyPair, PublicKey, Signature};

// Content encryption
pub use crate::{ContentKey, Envelope, Recipient, X25519Secret};
