//! vcvault Test - fake remote services for vcvault tests.
//!
//! [`FakeKms`] and [`FakeEdv`] are stateful `wiremock` servers that speak the
//! KMS and EDV protocols closely enough for end-to-end client tests: they
//! verify HTTP signatures, check capability invocations (action, target,
//! controller or delegation proof), keep real X25519 keys and store
//! encrypted documents.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! vcvault-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! let services = vcvault_test::FakeServices::start().await;
//! let config = ClientConfig::new(&services.kms.uri(), &services.edv.uri())?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod edv;
pub mod fixtures;
pub mod kms;

mod auth;

pub use auth::Call;
pub use edv::FakeEdv;
pub use fixtures::*;
pub use kms::FakeKms;
