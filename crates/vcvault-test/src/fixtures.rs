//! Test fixtures for common values.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use vcvault_crypto::KeyPair;
use vcvault_remote::Controller;

use crate::edv::FakeEdv;
use crate::kms::FakeKms;

/// A fake KMS and EDV started together.
#[derive(Debug)]
pub struct FakeServices {
    /// The key-management service.
    pub kms: FakeKms,
    /// The encrypted data vault.
    pub edv: FakeEdv,
}

impl FakeServices {
    /// Start both fakes.
    pub async fn start() -> Self {
        Self {
            kms: FakeKms::start().await,
            edv: FakeEdv::start().await,
        }
    }
}

/// A third party with its own fresh `did:key`.
#[must_use]
pub fn test_requesting_party() -> Controller {
    Controller::new(Arc::new(KeyPair::generate()))
}

/// A small verifiable credential.
#[must_use]
pub fn test_credential() -> Value {
    json!({
        "@context": ["https://www.w3.org/2018/credentials/v1"],
        "type": ["VerifiableCredential", "UniversityDegreeCredential"],
        "issuer": "did:example:76e12ec712ebc6f1c221ebfeb1f",
        "issuanceDate": "2010-01-01T19:23:24Z",
        "credentialSubject": {
            "id": "did:example:ebfeb1f712ebc6f1c276e12ec21",
            "degree": {"type": "BachelorDegree", "name": "Bachelor of Science and Arts"}
        }
    })
}

/// Route `tracing` output to the test writer, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
