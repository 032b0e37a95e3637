//! Self-certifying `did:key` identities for Ed25519 keys.
//!
//! The method-specific id is the multibase (base58btc, `z` prefix) encoding
//! of the multicodec `ed25519-pub` prefix followed by the raw public key.
//! The verification method of a `did:key` is the DID itself with the same
//! fingerprint repeated as its fragment: `did:key:z6Mk…#z6Mk…`.

use std::fmt;

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::PublicKey;

/// Scheme and method prefix of every `did:key` identifier.
pub const DID_KEY_PREFIX: &str = "did:key:";

/// Multicodec varint for `ed25519-pub`.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Multibase prefix for base58btc.
const MULTIBASE_BASE58BTC: char = 'z';

/// A `did:key` identity bound to an Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DidKey {
    public_key: PublicKey,
}

impl DidKey {
    /// Derive the identity of a public key.
    #[must_use]
    pub const fn from_public_key(public_key: &PublicKey) -> Self {
        Self {
            public_key: *public_key,
        }
    }

    /// Parse a `did:key` or its verification-method URL.
    ///
    /// When a fragment is present it must repeat the DID's fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidDid`] if the input is not an Ed25519
    /// `did:key`, or [`CryptoError::InvalidKeyLength`] if the embedded key
    /// has the wrong size.
    pub fn parse(input: &str) -> CryptoResult<Self> {
        let rest = input
            .strip_prefix(DID_KEY_PREFIX)
            .ok_or_else(|| CryptoError::InvalidDid(format!("missing '{DID_KEY_PREFIX}' prefix")))?;

        let (fingerprint, fragment) = match rest.split_once('#') {
            Some((fp, frag)) => (fp, Some(frag)),
            None => (rest, None),
        };

        let encoded = fingerprint
            .strip_prefix(MULTIBASE_BASE58BTC)
            .ok_or_else(|| CryptoError::InvalidDid("expected base58btc multibase".into()))?;
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| CryptoError::InvalidDid(e.to_string()))?;

        let key_bytes = decoded
            .strip_prefix(&ED25519_MULTICODEC)
            .ok_or_else(|| CryptoError::InvalidDid("not an ed25519 public key".into()))?;
        let did = Self::from_public_key(&PublicKey::try_from_slice(key_bytes)?);

        if let Some(fragment) = fragment
            && fragment != fingerprint
        {
            return Err(CryptoError::InvalidDid(format!(
                "fragment '{fragment}' does not match key fingerprint"
            )));
        }

        Ok(did)
    }

    /// The public key this identity certifies.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Multibase fingerprint, e.g. `z6Mk…`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut bytes = Vec::with_capacity(34);
        bytes.extend_from_slice(&ED25519_MULTICODEC);
        bytes.extend_from_slice(self.public_key.as_bytes());

        let mut out = String::with_capacity(48);
        out.push(MULTIBASE_BASE58BTC);
        out.push_str(&bs58::encode(bytes).into_string());
        out
    }

    /// The DID string, `did:key:<fingerprint>`.
    #[must_use]
    pub fn did(&self) -> String {
        format!("{DID_KEY_PREFIX}{}", self.fingerprint())
    }

    /// The verification-method URL, `did:key:<fingerprint>#<fingerprint>`.
    #[must_use]
    pub fn verification_method(&self) -> String {
        let fingerprint = self.fingerprint();
        format!("{DID_KEY_PREFIX}{fingerprint}#{fingerprint}")
    }
}

impl fmt::Debug for DidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DidKey({})", self.did())
    }
}

impl fmt::Display for DidKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.did())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyPair;

    #[test]
    fn test_ed25519_fingerprint_prefix() {
        // Every ed25519 did:key starts with z6Mk.
        let did = DidKey::from_public_key(&KeyPair::generate().export_public_key());
        assert!(did.did().starts_with("did:key:z6Mk"), "{}", did.did());
    }

    #[test]
    fn test_known_vector() {
        // Test vector from the did:key method specification.
        let did = "did:key:z6MkiTBz1ymuepAQ4HEHYSF1H8quG5GLVVQR3djdX3mDooWp";
        let parsed = DidKey::parse(did).unwrap();
        assert_eq!(parsed.did(), did);
        assert_eq!(
            parsed.verification_method(),
            "did:key:z6MkiTBz1ymuepAQ4HEHYSF1H8quG5GLVVQR3djdX3mDooWp#z6MkiTBz1ymuepAQ4HEHYSF1H8quG5GLVVQR3djdX3mDooWp"
        );
    }

    #[test]
    fn test_deterministic_for_fixed_key() {
        let pk = KeyPair::generate().export_public_key();
        assert_eq!(
            DidKey::from_public_key(&pk).did(),
            DidKey::from_public_key(&pk).did()
        );
    }

    #[test]
    fn test_parse_verification_method() {
        let pk = KeyPair::generate().export_public_key();
        let did = DidKey::from_public_key(&pk);
        let parsed = DidKey::parse(&did.verification_method()).unwrap();
        assert_eq!(parsed.public_key(), pk);
    }

    #[test]
    fn test_parse_rejects_mismatched_fragment() {
        let a = DidKey::from_public_key(&KeyPair::generate().export_public_key());
        let b = DidKey::from_public_key(&KeyPair::generate().export_public_key());
        let url = format!("{}#{}", a.did(), b.fingerprint());
        assert!(matches!(
            DidKey::parse(&url),
            Err(CryptoError::InvalidDid(_))
        ));
    }

    #[test]
    fn test_parse_rejects_other_methods() {
        assert!(DidKey::parse("did:web:example.com").is_err());
        assert!(DidKey::parse("did:key:uABC").is_err());
        assert!(DidKey::parse("did:key:z0OIl").is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_key() {
        let mut bytes = ED25519_MULTICODEC.to_vec();
        bytes.extend_from_slice(&[7u8; 16]);
        let did = format!("did:key:z{}", bs58::encode(bytes).into_string());
        assert!(matches!(
            DidKey::parse(&did),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }
}
