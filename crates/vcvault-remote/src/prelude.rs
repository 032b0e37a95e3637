//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vcvault_remote::prelude::*;` to import all essential types.

// Errors
pub use crate::{RemoteError, RemoteResult};

// Clients
pub use crate::{EdvClient, KmsClient, http_client};

// Signing
pub use crate::{Authority, Controller, sign_request, verify_request};
