//! vcvault Capabilities - authorization capabilities for vault access.
//!
//! A vault is reachable only through capabilities (ZCAPs). This crate holds:
//! - the capability document model and its delegation proof
//! - the compressed transport form (`base64url(gzip(json))`)
//! - delegation of narrower capabilities per [`ResourceKind`]
//! - the `capability-invocation` header attached to every remote call

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod prelude;

mod capability;
mod delegation;
mod error;
mod invocation;

pub use capability::{
    Capability, Caveat, DELEGATION_PURPOSE, InvocationTarget, PROOF_TYPE, Proof, SECURITY_CONTEXT,
};
pub use codec::{compress, decompress};
pub use delegation::{DelegationBuilder, ResourceKind, resolve_id};
pub use error::{CapabilityError, CapabilityResult};
pub use invocation::{INVOCATION_HEADER, Invocation, actions, vault_action};
