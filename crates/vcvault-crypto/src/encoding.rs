//! Base64url helpers shared by the envelope, capability proofs and KMS payloads.
//!
//! Encoding never emits padding. Decoding accepts input with or without it,
//! since remote services are not consistent about padding.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{CryptoError, CryptoResult};

const B64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url.
#[must_use]
pub fn encode_b64url(bytes: impl AsRef<[u8]>) -> String {
    B64URL.encode(bytes)
}

/// Decode base64url, padded or not.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidBase64Encoding`] if the input is not base64url.
pub fn decode_b64url(s: &str) -> CryptoResult<Vec<u8>> {
    B64URL
        .decode(s)
        .map_err(|_| CryptoError::InvalidBase64Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_padding_emitted() {
        assert_eq!(encode_b64url([0xfb, 0xff]), "-_8");
    }

    #[test]
    fn test_decode_accepts_padding() {
        assert_eq!(decode_b64url("-_8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(decode_b64url("-_8").unwrap(), vec![0xfb, 0xff]);
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        assert!(matches!(
            decode_b64url("+/8"),
            Err(CryptoError::InvalidBase64Encoding)
        ));
    }
}
