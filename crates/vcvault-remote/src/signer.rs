//! HTTP message signatures for capability invocations.
//!
//! Every call to the KMS or EDV is signed by the vault's controller key:
//!
//! ```text
//! capability-invocation: zcap capability="<compressed>",action="<action>"
//! host: kms.example.com
//! date: Tue, 07 Jun 2026 20:51:35 GMT
//! digest: SHA-256=<base64 sha256(body)>
//! signature: keyId="did:key:z…#z…",algorithm="ed25519",headers="(request-target) host date digest capability-invocation",signature="<base64>"
//! ```
//!
//! Bootstrap calls carry no invocation and sign only the first four. A
//! request that carries an invocation must sign it, so the capability and
//! action cannot be swapped on a captured request.
//!
//! The signing string joins the listed headers as `name: value` lines, with
//! the pseudo-header `(request-target)` rendered as `<lowercase method> <path?query>`.
//! The verifier resolves the public key straight from the `did:key` in
//! `keyId`, so no key registry is involved.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::header::{DATE, HOST, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Request};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use url::Url;
use vcvault_capabilities::{INVOCATION_HEADER, Invocation};
use vcvault_crypto::{DidKey, KeyPair, Signature};

use crate::error::{RemoteError, RemoteResult};

/// Headers covered by every signature, in order.
pub const SIGNED_HEADERS: &str = "(request-target) host date digest";

/// Headers covered by the signature of a capability invocation, in order.
pub const INVOKED_SIGNED_HEADERS: &str =
    "(request-target) host date digest capability-invocation";

const SIGNATURE_ALGORITHM: &str = "ed25519";
const REQUEST_TARGET: &str = "(request-target)";
const DIGEST: HeaderName = HeaderName::from_static("digest");
const SIGNATURE: HeaderName = HeaderName::from_static("signature");

/// The key that controls a vault, as seen by the remote services.
#[derive(Clone)]
pub struct Controller {
    keypair: Arc<KeyPair>,
    did: DidKey,
}

impl Controller {
    /// Wrap a controller key pair.
    #[must_use]
    pub fn new(keypair: Arc<KeyPair>) -> Self {
        let did = DidKey::from_public_key(&keypair.export_public_key());
        Self { keypair, did }
    }

    /// The controller's identity.
    #[must_use]
    pub fn did(&self) -> &DidKey {
        &self.did
    }

    /// The `keyId` placed in signatures (the DID's verification method).
    #[must_use]
    pub fn key_id(&self) -> String {
        self.did.verification_method()
    }

    /// The underlying key pair.
    #[must_use]
    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("did", &self.did)
            .finish_non_exhaustive()
    }
}

/// A controller invoking one capability.
#[derive(Debug, Clone)]
pub struct Authority {
    /// Signing controller.
    pub controller: Controller,
    /// Compressed capability to invoke.
    pub capability: String,
}

impl Authority {
    /// Pair a controller with a compressed capability.
    #[must_use]
    pub fn new(controller: Controller, capability: impl Into<String>) -> Self {
        Self {
            controller,
            capability: capability.into(),
        }
    }

    /// The invocation of this authority's capability for `action`.
    #[must_use]
    pub fn invocation(&self, action: &str) -> Invocation {
        Invocation::new(self.capability.clone(), action)
    }
}

/// `SHA-256=<base64>` digest header value of a body.
#[must_use]
pub fn digest_header(body: &[u8]) -> String {
    format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)))
}

fn host_header(url: &Url) -> RemoteResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| RemoteError::Signing(format!("URL {url} has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn header_value(value: &str) -> RemoteResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| RemoteError::Signing(e.to_string()))
}

fn signing_string(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    names: &str,
) -> RemoteResult<String> {
    let mut lines = Vec::new();
    for name in names.split_whitespace() {
        if name == REQUEST_TARGET {
            let target = match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            };
            lines.push(format!(
                "{REQUEST_TARGET}: {} {target}",
                method.as_str().to_lowercase()
            ));
            continue;
        }
        let value = headers
            .get(name)
            .ok_or_else(|| RemoteError::Signing(format!("missing signed header '{name}'")))?
            .to_str()
            .map_err(|e| RemoteError::Signing(format!("header '{name}': {e}")))?;
        lines.push(format!("{name}: {value}"));
    }
    Ok(lines.join("\n"))
}

/// Attach the invocation header (if any) and an HTTP signature to `request`.
///
/// An existing `date` header is kept, so signing the same request twice
/// yields the same signature.
///
/// # Errors
///
/// Returns [`RemoteError::Signing`] if the URL has no host, the body is a
/// stream, or a header value is not valid.
pub fn sign_request(
    request: &mut Request,
    controller: &Controller,
    invocation: Option<&Invocation>,
) -> RemoteResult<()> {
    let digest = match request.body() {
        Some(body) => {
            let bytes = body.as_bytes().ok_or_else(|| {
                RemoteError::Signing("streaming request bodies cannot be signed".into())
            })?;
            digest_header(bytes)
        },
        None => digest_header(&[]),
    };
    let host = host_header(request.url())?;

    let headers = request.headers_mut();
    if let Some(invocation) = invocation {
        headers.insert(
            HeaderName::from_static(INVOCATION_HEADER),
            header_value(&invocation.header_value())?,
        );
    }
    headers.insert(HOST, header_value(&host)?);
    if !headers.contains_key(DATE) {
        let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        headers.insert(DATE, header_value(&now)?);
    }
    headers.insert(DIGEST, header_value(&digest)?);

    let covered = if invocation.is_some() {
        INVOKED_SIGNED_HEADERS
    } else {
        SIGNED_HEADERS
    };
    let signing_string =
        signing_string(request.method(), request.url(), request.headers(), covered)?;
    let signature = controller.keypair().sign(signing_string.as_bytes());

    let value = format!(
        "keyId=\"{}\",algorithm=\"{SIGNATURE_ALGORITHM}\",headers=\"{covered}\",signature=\"{}\"",
        controller.key_id(),
        signature.to_base64()
    );
    request.headers_mut().insert(SIGNATURE, header_value(&value)?);
    Ok(())
}

/// Parsed `signature` header parameters.
struct SignatureParams {
    key_id: String,
    algorithm: String,
    headers: String,
    signature: String,
}

fn parse_signature_header(value: &str) -> RemoteResult<SignatureParams> {
    let mut key_id = None;
    let mut algorithm = None;
    let mut headers = None;
    let mut signature = None;
    for param in value.split(',') {
        let Some((name, raw)) = param.trim().split_once('=') else {
            continue;
        };
        let val = Some(raw.trim_matches('"').to_string());
        match name {
            "keyId" => key_id = val,
            "algorithm" => algorithm = val,
            "headers" => headers = val,
            "signature" => signature = val,
            _ => {},
        }
    }
    let missing = |name: &str| RemoteError::InvalidSignature(format!("missing '{name}'"));
    Ok(SignatureParams {
        key_id: key_id.ok_or_else(|| missing("keyId"))?,
        algorithm: algorithm.unwrap_or_else(|| SIGNATURE_ALGORITHM.to_string()),
        headers: headers.ok_or_else(|| missing("headers"))?,
        signature: signature.ok_or_else(|| missing("signature"))?,
    })
}

/// Verify the HTTP signature of a request given as its parts.
///
/// Returns the identity of the signer. The signature must cover the
/// request target and the body digest, plus the capability invocation when
/// one is present, and the digest must match `body`.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidSignature`] on any verification failure.
pub fn verify_signature(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    body: &[u8],
) -> RemoteResult<DidKey> {
    let raw = headers
        .get(SIGNATURE)
        .ok_or_else(|| RemoteError::InvalidSignature("no signature header".into()))?
        .to_str()
        .map_err(|e| RemoteError::InvalidSignature(e.to_string()))?;
    let params = parse_signature_header(raw)?;

    if !params.algorithm.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
        return Err(RemoteError::InvalidSignature(format!(
            "unsupported algorithm '{}'",
            params.algorithm
        )));
    }
    let covered: Vec<&str> = params.headers.split_whitespace().collect();
    let invoked = headers.contains_key(INVOCATION_HEADER);
    for required in [REQUEST_TARGET, "digest", INVOCATION_HEADER] {
        if required == INVOCATION_HEADER && !invoked {
            continue;
        }
        if !covered.contains(&required) {
            return Err(RemoteError::InvalidSignature(format!(
                "signature does not cover '{required}'"
            )));
        }
    }

    let sent_digest = headers
        .get(DIGEST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RemoteError::InvalidSignature("no digest header".into()))?;
    let expected_digest = digest_header(body);
    if !bool::from(sent_digest.as_bytes().ct_eq(expected_digest.as_bytes())) {
        return Err(RemoteError::InvalidSignature(
            "body does not match digest".into(),
        ));
    }

    let signer = DidKey::parse(&params.key_id)
        .map_err(|e| RemoteError::InvalidSignature(format!("keyId: {e}")))?;
    let signature = Signature::from_base64(&params.signature)
        .map_err(|e| RemoteError::InvalidSignature(e.to_string()))?;
    let signing_string = signing_string(method, url, headers, &params.headers)
        .map_err(|e| RemoteError::InvalidSignature(e.to_string()))?;

    signer
        .public_key()
        .verify(signing_string.as_bytes(), &signature)
        .map_err(|_| RemoteError::InvalidSignature("signature mismatch".into()))?;
    Ok(signer)
}

/// Verify the HTTP signature of a built request.
///
/// # Errors
///
/// Returns [`RemoteError::InvalidSignature`] on any verification failure,
/// including a streaming body that cannot be digested.
pub fn verify_request(request: &Request) -> RemoteResult<DidKey> {
    let body = match request.body() {
        Some(body) => body.as_bytes().ok_or_else(|| {
            RemoteError::InvalidSignature("streaming bodies cannot be verified".into())
        })?,
        None => &[],
    };
    verify_signature(request.method(), request.url(), request.headers(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcvault_capabilities::actions;

    fn controller() -> Controller {
        Controller::new(Arc::new(KeyPair::generate()))
    }

    fn post(body: &str) -> Request {
        reqwest::Client::new()
            .post("https://edv.example.com:8443/encrypted-data-vaults/v1/documents?x=1")
            .body(body.to_string())
            .build()
            .unwrap()
    }

    #[test]
    fn test_signed_request_headers() {
        let controller = controller();
        let mut request = post("{}");
        let invocation = Invocation::new("H4sI", actions::WRITE);
        sign_request(&mut request, &controller, Some(&invocation)).unwrap();

        let headers = request.headers();
        assert_eq!(headers[HOST], "edv.example.com:8443");
        assert!(headers.contains_key(DATE));
        assert_eq!(headers[DIGEST].to_str().unwrap(), digest_header(b"{}"));
        assert_eq!(
            headers[INVOCATION_HEADER],
            r#"zcap capability="H4sI",action="write""#
        );

        let sig = headers[SIGNATURE].to_str().unwrap();
        assert!(sig.contains(&format!("keyId=\"{}\"", controller.key_id())));
        assert!(sig.contains(
            r#"headers="(request-target) host date digest capability-invocation""#
        ));
        assert!(verify_request(&request).is_ok());
    }

    #[test]
    fn test_bootstrap_signature_omits_invocation() {
        let mut request = post("{}");
        sign_request(&mut request, &controller(), None).unwrap();
        let sig = request.headers()[SIGNATURE].to_str().unwrap();
        assert!(sig.contains(r#"headers="(request-target) host date digest""#));
    }

    #[test]
    fn test_swapped_invocation_detected() {
        let mut request = post("{}");
        let invocation = Invocation::new("H4sI", actions::READ);
        sign_request(&mut request, &controller(), Some(&invocation)).unwrap();

        let swapped = Invocation::new("H4sI", actions::WRITE);
        request.headers_mut().insert(
            HeaderName::from_static(INVOCATION_HEADER),
            HeaderValue::from_str(&swapped.header_value()).unwrap(),
        );
        assert!(matches!(
            verify_request(&request),
            Err(RemoteError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_invocation_outside_signature_rejected() {
        let mut request = post("{}");
        sign_request(&mut request, &controller(), None).unwrap();
        let added = Invocation::new("H4sI", actions::WRITE);
        request.headers_mut().insert(
            HeaderName::from_static(INVOCATION_HEADER),
            HeaderValue::from_str(&added.header_value()).unwrap(),
        );

        let err = verify_request(&request).unwrap_err();
        assert!(err.to_string().contains(INVOCATION_HEADER), "{err}");
    }

    #[test]
    fn test_signing_string_layout() {
        let mut request = post("{}");
        sign_request(&mut request, &controller(), None).unwrap();
        let s = signing_string(
            request.method(),
            request.url(),
            request.headers(),
            SIGNED_HEADERS,
        )
        .unwrap();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(
            lines[0],
            "(request-target): post /encrypted-data-vaults/v1/documents?x=1"
        );
        assert_eq!(lines[1], "host: edv.example.com:8443");
        assert!(lines[2].starts_with("date: "));
        assert!(lines[3].starts_with("digest: SHA-256="));
    }

    #[test]
    fn test_sign_then_verify() {
        let controller = controller();
        let mut request = post(r#"{"id":"doc"}"#);
        sign_request(&mut request, &controller, None).unwrap();

        let signer = verify_request(&request).unwrap();
        assert_eq!(&signer, controller.did());
    }

    #[test]
    fn test_deterministic_with_fixed_date() {
        let controller = controller();
        let fixed = HeaderValue::from_static("Tue, 07 Jun 2026 20:51:35 GMT");

        let mut a = post("{}");
        a.headers_mut().insert(DATE, fixed.clone());
        sign_request(&mut a, &controller, None).unwrap();

        let mut b = post("{}");
        b.headers_mut().insert(DATE, fixed);
        sign_request(&mut b, &controller, None).unwrap();

        assert_eq!(a.headers()[SIGNATURE], b.headers()[SIGNATURE]);
    }

    #[test]
    fn test_body_tampering_detected() {
        let mut request = post(r#"{"amount":1}"#);
        sign_request(&mut request, &controller(), None).unwrap();

        let err = verify_signature(
            request.method(),
            request.url(),
            request.headers(),
            br#"{"amount":1000}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("digest"), "{err}");
    }

    #[test]
    fn test_path_tampering_detected() {
        let mut request = post("{}");
        sign_request(&mut request, &controller(), None).unwrap();

        let other: Url = "https://edv.example.com:8443/encrypted-data-vaults/v2/documents?x=1"
            .parse()
            .unwrap();
        assert!(
            verify_signature(request.method(), &other, request.headers(), b"{}").is_err()
        );
    }

    #[test]
    fn test_get_without_body() {
        let mut request = reqwest::Client::new()
            .get("https://kms.example.com/kms/keystores/ks/keys/k/export")
            .build()
            .unwrap();
        sign_request(&mut request, &controller(), None).unwrap();
        assert_eq!(
            request.headers()[DIGEST].to_str().unwrap(),
            digest_header(&[])
        );
        assert!(verify_request(&request).is_ok());
    }

    #[test]
    fn test_unsigned_request_rejected() {
        let request = post("{}");
        assert!(matches!(
            verify_request(&request),
            Err(RemoteError::InvalidSignature(_))
        ));
    }
}
