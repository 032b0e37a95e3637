//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vcvault::prelude::*;` to import all essential types.

// Errors
pub use crate::{ErrorKind, VaultError, VaultResult, VaultResultExt};

// Client
pub use crate::{ClientConfig, VaultClient};

// Records
pub use crate::{CreatedAuthorization, CreatedVault, DocumentMetadata, Scope};

// Storage
pub use crate::{KvStore, MemoryKvStore};
