//! Request checks shared by the fake services.
//!
//! A request is accepted when its HTTP signature verifies and the capability
//! it invokes:
//! - names the expected action, and allows it
//! - targets the resource being accessed
//! - is either the service's own root capability invoked by the resource
//!   controller, or a capability delegated by the controller and invoked by
//!   its named invoker

use std::sync::{Mutex, MutexGuard, PoisonError};

use vcvault_capabilities::{Capability, INVOCATION_HEADER, Invocation, decompress};
use vcvault_crypto::DidKey;
use vcvault_remote::verify_signature;
use wiremock::{Request, ResponseTemplate};

/// A request seen by a fake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Invoked action, if the request carried a capability.
    pub action: Option<String>,
}

impl Call {
    pub(crate) fn from_request(request: &Request) -> Self {
        let action = request
            .headers
            .get(INVOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Invocation::parse(v).ok())
            .map(|inv| inv.action);
        Self {
            method: request.method.to_string(),
            path: request.url.path().to_string(),
            action,
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn status(code: u16, reason: impl Into<String>) -> ResponseTemplate {
    let reason = reason.into();
    tracing::debug!(code, %reason, "fake service rejected request");
    ResponseTemplate::new(code).set_body_string(reason)
}

fn forbidden(reason: impl Into<String>) -> ResponseTemplate {
    status(403, reason)
}

/// The verified signer of a request.
pub(crate) fn signer(request: &Request) -> Result<DidKey, ResponseTemplate> {
    verify_signature(&request.method, &request.url, &request.headers, &request.body)
        .map_err(|e| status(401, e.to_string()))
}

/// Parse a JSON request body.
pub(crate) fn json_body<T: serde::de::DeserializeOwned>(
    request: &Request,
) -> Result<T, ResponseTemplate> {
    serde_json::from_slice(&request.body).map_err(|e| status(400, e.to_string()))
}

/// Check that `request` may perform `action` on the resource at
/// `target_path`, which is controlled by `controller`.
pub(crate) fn authorize(
    request: &Request,
    controller: &str,
    target_path: &str,
    action: &str,
) -> Result<Capability, ResponseTemplate> {
    let signer = signer(request)?;

    let header = request
        .headers
        .get(INVOCATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| forbidden("missing capability invocation"))?;
    let invocation = Invocation::parse(header).map_err(|e| forbidden(e.to_string()))?;
    if invocation.action != action {
        return Err(forbidden(format!(
            "expected action {action}, got {}",
            invocation.action
        )));
    }

    let capability = decompress(&invocation.capability).map_err(|e| forbidden(e.to_string()))?;
    if !capability.allows(action) {
        return Err(forbidden(format!("capability does not allow {action}")));
    }
    if !capability.invocation_target.id.ends_with(target_path) {
        return Err(forbidden(format!(
            "capability targets {}, not {target_path}",
            capability.invocation_target.id
        )));
    }

    if capability.proof.is_none() {
        if capability.controller.as_deref() != Some(controller) || signer.did() != controller {
            return Err(forbidden("root capability invoked by a non-controller"));
        }
    } else {
        let delegator = capability
            .verify_delegation()
            .map_err(|e| forbidden(e.to_string()))?;
        if delegator.did() != controller {
            return Err(forbidden("capability was not delegated by the controller"));
        }
        if capability.invoker != signer.verification_method() {
            return Err(forbidden("request not signed by the capability invoker"));
        }
    }

    Ok(capability)
}
