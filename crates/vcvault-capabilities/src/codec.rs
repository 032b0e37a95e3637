//! Compressed capability form.
//!
//! Capabilities cross every boundary (HTTP headers, stored authorizations,
//! API responses) as `base64url(gzip(json))`. The encoder pads its output;
//! the decoder accepts both padded and unpadded input.

use std::io::{Read, Write};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::capability::Capability;
use crate::error::{CapabilityError, CapabilityResult};

/// Upper bound on the decompressed JSON size.
const MAX_DECOMPRESSED_BYTES: u64 = 1_048_576;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Compress a capability to its transport form.
///
/// # Errors
///
/// Returns [`CapabilityError::SerializationError`] if JSON encoding fails,
/// or [`CapabilityError::EncodingError`] if compression fails.
pub fn compress(capability: &Capability) -> CapabilityResult<String> {
    let json = serde_json::to_vec(capability)
        .map_err(|e| CapabilityError::SerializationError(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| CapabilityError::EncodingError(e.to_string()))?;
    let gz = encoder
        .finish()
        .map_err(|e| CapabilityError::EncodingError(e.to_string()))?;

    Ok(URL_SAFE_LENIENT.encode(gz))
}

/// Decode a capability from its transport form.
///
/// # Errors
///
/// Returns [`CapabilityError::EncodingError`] if the input is not
/// base64url-encoded gzip or inflates past the size limit, or
/// [`CapabilityError::SerializationError`] if it is not a capability.
pub fn decompress(encoded: &str) -> CapabilityResult<Capability> {
    let gz = URL_SAFE_LENIENT
        .decode(encoded.trim())
        .map_err(|e| CapabilityError::EncodingError(format!("base64: {e}")))?;

    let mut json = Vec::new();
    GzDecoder::new(gz.as_slice())
        .take(MAX_DECOMPRESSED_BYTES.saturating_add(1))
        .read_to_end(&mut json)
        .map_err(|e| CapabilityError::EncodingError(format!("gzip: {e}")))?;
    if u64::try_from(json.len()).unwrap_or(u64::MAX) > MAX_DECOMPRESSED_BYTES {
        return Err(CapabilityError::EncodingError(
            "decompressed capability exceeds size limit".into(),
        ));
    }

    serde_json::from_slice(&json).map_err(|e| CapabilityError::SerializationError(e.to_string()))
}
