//! The capability document.
//!
//! A capability names a target (`invocationTarget`), the party allowed to
//! invoke it (`invoker`), what it may do (`allowedActions`) and where its
//! authority comes from (`parent` and the full `capabilityChain` back to the
//! root). Delegated capabilities carry a proof signed by the delegator.
//!
//! The proof signs the RFC 8785 canonical JSON of the capability with the
//! proof attached but its `proofValue` removed, so every field including
//! the proof metadata is covered.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use vcvault_crypto::{DidKey, KeyPair, PublicKey, Signature};

use crate::error::{CapabilityError, CapabilityResult};

/// JSON-LD context of delegated capabilities.
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v2";

/// Proof suite used for every delegation.
pub const PROOF_TYPE: &str = "Ed25519Signature2018";

/// Proof purpose of a delegation proof.
pub const DELEGATION_PURPOSE: &str = "capabilityDelegation";

/// The resource a capability may be invoked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationTarget {
    /// Target URL or id.
    pub id: String,
    /// Target type, e.g. `urn:edv:vault`.
    #[serde(rename = "type")]
    pub target_type: String,
}

/// A restriction attached to a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    /// Caveat type, e.g. `zcap-expiry`.
    #[serde(rename = "type")]
    pub caveat_type: String,
    /// Duration in seconds, for time-bound caveats.
    #[serde(default)]
    pub duration: u64,
}

/// Linked-data proof over a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Proof suite.
    #[serde(rename = "type")]
    pub proof_type: String,
    /// Creation time (RFC 3339).
    pub created: String,
    /// DID URL of the signing key.
    pub verification_method: String,
    /// Proof purpose.
    pub proof_purpose: String,
    /// Base64url signature; absent while computing the signing input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
}

/// An authorization capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// JSON-LD context.
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// Capability id (`urn:uuid:…` or a URL for root capabilities).
    pub id: String,
    /// Id of the capability this one was delegated from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    /// Controller of a root capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    /// DID URL of the party that may invoke this capability.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub invoker: String,
    /// The target resource.
    pub invocation_target: InvocationTarget,
    /// Permitted actions. Empty on a root capability means unrestricted.
    #[serde(default)]
    pub allowed_actions: Vec<String>,
    /// Restrictions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caveats: Vec<Caveat>,
    /// Ids of every ancestor, root first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_chain: Vec<String>,
    /// Delegation proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl Capability {
    /// Whether this capability permits `action`.
    #[must_use]
    pub fn allows(&self, action: &str) -> bool {
        self.allowed_actions.is_empty() || self.allowed_actions.iter().any(|a| a == action)
    }

    /// Canonical bytes covered by the proof signature.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::SerializationError`] if canonicalization fails.
    pub fn signing_input(&self) -> CapabilityResult<Vec<u8>> {
        let mut unsigned = self.clone();
        if let Some(proof) = unsigned.proof.as_mut() {
            proof.proof_value = None;
        }
        serde_jcs::to_vec(&unsigned).map_err(|e| CapabilityError::SerializationError(e.to_string()))
    }

    /// Attach a fresh delegation proof signed by `signer`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::SerializationError`] if the signing input
    /// cannot be produced.
    pub fn sign(&mut self, signer: &KeyPair, verification_method: &str) -> CapabilityResult<()> {
        self.proof = Some(Proof {
            proof_type: PROOF_TYPE.to_string(),
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            verification_method: verification_method.to_string(),
            proof_purpose: DELEGATION_PURPOSE.to_string(),
            proof_value: None,
        });

        let signature = signer.sign(&self.signing_input()?);
        if let Some(proof) = self.proof.as_mut() {
            proof.proof_value = Some(signature.to_base64url());
        }
        Ok(())
    }

    /// Verify the proof against a known public key.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::MissingProof`] if there is no proof,
    /// [`CapabilityError::InvalidProof`] if it is not a delegation proof of
    /// the expected suite, or [`CapabilityError::InvalidSignature`] if the
    /// signature does not match.
    pub fn verify_proof(&self, public_key: &PublicKey) -> CapabilityResult<()> {
        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| CapabilityError::MissingProof {
                id: self.id.clone(),
            })?;

        if proof.proof_type != PROOF_TYPE {
            return Err(CapabilityError::InvalidProof(format!(
                "unsupported proof type '{}'",
                proof.proof_type
            )));
        }
        if proof.proof_purpose != DELEGATION_PURPOSE {
            return Err(CapabilityError::InvalidProof(format!(
                "unexpected proof purpose '{}'",
                proof.proof_purpose
            )));
        }

        let value = proof
            .proof_value
            .as_deref()
            .ok_or_else(|| CapabilityError::InvalidProof("missing proofValue".into()))?;
        let signature = Signature::from_base64url(value)?;

        public_key
            .verify(&self.signing_input()?, &signature)
            .map_err(|_| CapabilityError::InvalidSignature)
    }

    /// Verify the proof against the key named by its own `did:key`
    /// verification method, returning the delegator's identity.
    ///
    /// # Errors
    ///
    /// Same as [`verify_proof`](Self::verify_proof), plus
    /// [`CapabilityError::CryptoError`] if the verification method is not a
    /// `did:key`.
    pub fn verify_delegation(&self) -> CapabilityResult<DidKey> {
        let method = self
            .proof
            .as_ref()
            .map(|p| p.verification_method.as_str())
            .ok_or_else(|| CapabilityError::MissingProof {
                id: self.id.clone(),
            })?;
        let delegator = DidKey::parse(method)?;
        self.verify_proof(&delegator.public_key())?;
        Ok(delegator)
    }
}
