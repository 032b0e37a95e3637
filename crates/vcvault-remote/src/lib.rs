//! vcvault Remote - signed HTTP clients for the KMS and EDV.
//!
//! Every call made on behalf of a vault is authenticated twice:
//! - a `capability-invocation` header names the capability being invoked and
//!   the action performed with it
//! - an HTTP message signature by the vault's controller key covers the
//!   method, path, host, date and body digest
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vcvault_crypto::KeyPair;
//! use vcvault_remote::{Controller, sign_request, verify_request};
//!
//! let controller = Controller::new(Arc::new(KeyPair::generate()));
//! let mut request = reqwest::Client::new()
//!     .post("https://edv.example.com/encrypted-data-vaults")
//!     .body("{}")
//!     .build()
//!     .unwrap();
//!
//! sign_request(&mut request, &controller, None).unwrap();
//! assert_eq!(&verify_request(&request).unwrap(), controller.did());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod edv;
pub mod kms;
pub mod prelude;
pub mod signer;

mod error;
mod transport;

pub use edv::{CreatedDataVault, DataVaultConfiguration, EdvClient, EncryptedDocument};
pub use error::{RemoteError, RemoteResult};
pub use kms::{KeyStore, KmsClient};
pub use signer::{Authority, Controller, sign_request, verify_request, verify_signature};
pub use transport::http_client;
