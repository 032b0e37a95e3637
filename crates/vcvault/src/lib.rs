//! vcvault - capability-based vault client.
//!
//! A vault is a remote key store (KMS) plus a remote encrypted data vault
//! (EDV), both controlled by a `did:key` identity the client creates. The
//! client:
//!
//! - provisions vaults ([`VaultClient::create_vault`])
//! - delegates narrower capabilities to third parties
//!   ([`VaultClient::create_authorization`])
//! - encrypts documents locally and stores them in the EDV
//!   ([`VaultClient::save_doc`], [`VaultClient::read_doc`])
//!
//! Every remote call carries a capability invocation and an HTTP message
//! signature by the vault's key. Local state (vault records, document
//! records, authorizations, signing keys) lives in a [`KvStore`].
//!
//! # Example
//!
//! ```no_run
//! use vcvault::{ClientConfig, Scope, VaultClient};
//!
//! # async fn demo() -> vcvault::VaultResult<()> {
//! let config = ClientConfig::new("https://kms.example.com", "https://edv.example.com")?;
//! let client = VaultClient::in_memory(&config)?;
//!
//! let vault = client.create_vault().await?;
//! client
//!     .save_doc(&vault.id, "passport", &serde_json::json!({"name": "Alice"}))
//!     .await?;
//!
//! let grant = client
//!     .create_authorization(
//!         &vault.id,
//!         "did:key:z6MkiTBz1ymuepAQ4HEHYSF1H8quG5GLVVQR3djdX3mDooWp",
//!         Scope::with_actions(["read"]),
//!     )
//!     .await?;
//! println!("hand {} to the requesting party", grant.tokens.edv);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config_bridge;
pub mod identity;
pub mod keys;
pub mod model;
pub mod prelude;
pub mod store;

mod authorization;
mod client;
mod documents;
mod error;
mod provision;

pub use client::{ClientConfig, DEFAULT_TIMEOUT, VaultClient};
pub use error::{ErrorKind, VaultError, VaultResult, VaultResultExt};
pub use identity::{Identity, derive_identity, to_did_url};
pub use keys::{KeyManager, LocalKeyManager};
pub use model::{
    Authorization, CreatedAuthorization, CreatedVault, DocMetaInfo, DocumentMetadata, Location,
    Scope, Tokens, VaultInfo,
};
pub use store::MetadataStore;

// Re-export the types callers need to configure and inspect a client.
pub use vcvault_capabilities::{Capability, Caveat, decompress};
pub use vcvault_config::Config;
pub use vcvault_storage::{KvStore, MemoryKvStore};
