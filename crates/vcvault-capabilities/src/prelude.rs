//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vcvault_capabilities::prelude::*;` to import all essential types.

// Errors
pub use crate::{CapabilityError, CapabilityResult};

// Capability model
pub use crate::{Capability, Caveat, InvocationTarget};

// Delegation and invocation
pub use crate::{DelegationBuilder, Invocation, ResourceKind};

// Transport form
pub use crate::{compress, decompress};
