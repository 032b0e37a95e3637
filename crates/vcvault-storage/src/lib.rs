//! vcvault Storage - local persistence for vault metadata.
//!
//! The vault client keeps three kinds of records locally: vault info,
//! per-document key references and issued authorizations. All of them are
//! small JSON blobs addressed by a string key, so the storage layer is a
//! plain namespaced byte store ([`KvStore`]) with a typed JSON view
//! ([`ScopedKvStore`]).
//!
//! # Backends
//!
//! | Backend | Feature | Use |
//! |---------|---------|-----|
//! | [`MemoryKvStore`] | always | tests, ephemeral clients |
//! | `SurrealKvStore` | `kv` | durable embedded store |

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;
