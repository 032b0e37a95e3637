//! JWE-style content encryption envelope.
//!
//! Content is encrypted with AES-256-GCM under a random content key (CEK).
//! The CEK is wrapped to a single recipient X25519 key:
//!
//! 1. generate an ephemeral X25519 key and compute the shared secret with the
//!    recipient's public key,
//! 2. derive a key-encryption key with HKDF-SHA256, binding the algorithm id,
//!    the ephemeral key and the recipient key,
//! 3. encrypt the CEK with AES-256-GCM under that key, with the recipient
//!    `kid` as associated data.
//!
//! The envelope never holds the recipient's private key. Whoever holds it
//! (the remote KMS) calls [`Recipient::unwrap_key`] and hands back the CEK, which
//! the client passes to [`Envelope::open`].

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use curve25519_dalek::montgomery::MontgomeryPoint;
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::encoding::{decode_b64url, encode_b64url};
use crate::error::{CryptoError, CryptoResult};

/// Key agreement and key wrapping algorithm of every recipient.
pub const KEY_WRAP_ALGORITHM: &str = "ECDH-ES+A256GCMKW";

/// Content encryption algorithm.
pub const CONTENT_ENCRYPTION: &str = "A256GCM";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// An X25519 private key held by the key owner.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct X25519Secret([u8; 32]);

impl X25519Secret {
    /// Generate a random private key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Restore from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw private key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Matching public key (Montgomery u-coordinate).
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        MontgomeryPoint::mul_base_clamped(self.0).to_bytes()
    }

    fn diffie_hellman(&self, peer: &[u8; 32]) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(MontgomeryPoint(*peer).mul_clamped(self.0).to_bytes())
    }
}

impl std::fmt::Debug for X25519Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519Secret").finish_non_exhaustive()
    }
}

/// A 256-bit content encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Restore from raw bytes, e.g. a key returned by the KMS.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey").finish_non_exhaustive()
    }
}

/// Ephemeral public key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralKey {
    /// Key type, always `OKP`.
    pub kty: String,
    /// Curve, always `X25519`.
    pub crv: String,
    /// Public key, base64url.
    pub x: String,
}

/// Per-recipient header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientHeader {
    /// Key wrapping algorithm.
    pub alg: String,
    /// Recipient key id (the KMS key URL).
    pub kid: String,
    /// Sender's ephemeral public key.
    pub epk: EphemeralKey,
}

/// A wrapped content key for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Recipient header.
    pub header: RecipientHeader,
    /// `nonce || ciphertext || tag` of the wrapped CEK, base64url.
    pub encrypted_key: String,
}

impl Recipient {
    fn wrap(cek: &ContentKey, kid: &str, recipient_public: &[u8; 32]) -> CryptoResult<Self> {
        let ephemeral = X25519Secret::generate();
        let epk = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(recipient_public);
        let kek = derive_kek(&shared, &epk, recipient_public)?;

        let sealed = aead_seal(&kek, cek.as_bytes(), kid.as_bytes())?;

        Ok(Self {
            header: RecipientHeader {
                alg: KEY_WRAP_ALGORITHM.to_string(),
                kid: kid.to_string(),
                epk: EphemeralKey {
                    kty: "OKP".to_string(),
                    crv: "X25519".to_string(),
                    x: encode_b64url(epk),
                },
            },
            encrypted_key: encode_b64url(sealed),
        })
    }

    /// Recover the content key with the recipient's private key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidEnvelope`] for an unsupported algorithm
    /// or malformed fields, and [`CryptoError::DecryptionFailed`] if the key
    /// does not match or the wrapped key was tampered with.
    pub fn unwrap_key(&self, secret: &X25519Secret) -> CryptoResult<ContentKey> {
        if self.header.alg != KEY_WRAP_ALGORITHM {
            return Err(CryptoError::InvalidEnvelope(format!(
                "unsupported key wrap algorithm '{}'",
                self.header.alg
            )));
        }
        if self.header.epk.crv != "X25519" {
            return Err(CryptoError::InvalidEnvelope(format!(
                "unsupported curve '{}'",
                self.header.epk.crv
            )));
        }

        let epk: [u8; 32] = decode_b64url(&self.header.epk.x)?
            .try_into()
            .map_err(|_| CryptoError::InvalidEnvelope("ephemeral key must be 32 bytes".into()))?;

        let shared = secret.diffie_hellman(&epk);
        let kek = derive_kek(&shared, &epk, &secret.public_key())?;

        let sealed = decode_b64url(&self.encrypted_key)?;
        let cek = Zeroizing::new(aead_open(&kek, &sealed, self.header.kid.as_bytes())?);
        ContentKey::from_bytes(&cek)
    }
}

/// Protected header, serialized then base64url-encoded.
#[derive(Serialize, Deserialize)]
struct ProtectedHeader {
    enc: String,
}

/// An encrypted document payload with one wrapped key per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64url protected header; also the AEAD associated data.
    pub protected: String,
    /// Wrapped content keys.
    pub recipients: Vec<Recipient>,
    /// Content nonce, base64url.
    pub iv: String,
    /// Encrypted content, base64url.
    pub ciphertext: String,
    /// Authentication tag, base64url.
    pub tag: String,
}

impl Envelope {
    /// Encrypt `plaintext` for the X25519 key identified by `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if encryption fails.
    pub fn seal(plaintext: &[u8], kid: &str, recipient_public: &[u8; 32]) -> CryptoResult<Self> {
        let cek = ContentKey::generate();
        let recipient = Recipient::wrap(&cek, kid, recipient_public)?;

        let header = serde_json::to_vec(&ProtectedHeader {
            enc: CONTENT_ENCRYPTION.to_string(),
        })
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let protected = encode_b64url(header);

        let mut sealed = aead_seal(cek.as_bytes(), plaintext, protected.as_bytes())?;
        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let tag_at = rest
            .len()
            .checked_sub(TAG_LEN)
            .ok_or_else(|| CryptoError::EncryptionFailed("ciphertext shorter than tag".into()))?;
        let (ciphertext, tag) = rest.split_at(tag_at);

        let envelope = Self {
            protected,
            recipients: vec![recipient],
            iv: encode_b64url(nonce),
            ciphertext: encode_b64url(ciphertext),
            tag: encode_b64url(tag),
        };
        sealed.zeroize();
        Ok(envelope)
    }

    /// The recipient entry for `kid`, if any.
    #[must_use]
    pub fn recipient(&self, kid: &str) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.header.kid == kid)
    }

    /// Decrypt the content with an already-unwrapped content key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidEnvelope`] for malformed fields, and
    /// [`CryptoError::DecryptionFailed`] if authentication fails.
    pub fn open(&self, cek: &ContentKey) -> CryptoResult<Vec<u8>> {
        let header: ProtectedHeader = serde_json::from_slice(&decode_b64url(&self.protected)?)
            .map_err(|e| CryptoError::InvalidEnvelope(e.to_string()))?;
        if header.enc != CONTENT_ENCRYPTION {
            return Err(CryptoError::InvalidEnvelope(format!(
                "unsupported content encryption '{}'",
                header.enc
            )));
        }

        let mut sealed = decode_b64url(&self.iv)?;
        if sealed.len() != NONCE_LEN {
            return Err(CryptoError::InvalidEnvelope("iv must be 12 bytes".into()));
        }
        sealed.extend_from_slice(&decode_b64url(&self.ciphertext)?);
        sealed.extend_from_slice(&decode_b64url(&self.tag)?);

        aead_open(cek.as_bytes(), &sealed, self.protected.as_bytes())
    }
}

fn derive_kek(
    shared: &[u8; 32],
    epk: &[u8; 32],
    recipient_public: &[u8; 32],
) -> CryptoResult<Zeroizing<[u8; 32]>> {
    let mut info = Vec::with_capacity(81);
    info.extend_from_slice(KEY_WRAP_ALGORITHM.as_bytes());
    info.extend_from_slice(epk);
    info.extend_from_slice(recipient_public);

    let mut kek = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(None, shared)
        .expand(&info, &mut kek[..])
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    Ok(kek)
}

/// AES-256-GCM with a random nonce; returns `nonce || ciphertext || tag`.
fn aead_seal(key: &[u8; 32], msg: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg, aad })
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN.saturating_add(ciphertext.len()));
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn aead_open(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN.saturating_add(TAG_LEN) {
        return Err(CryptoError::InvalidEnvelope("sealed data too short".into()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}
