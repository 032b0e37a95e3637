//! Shared plumbing for signed calls to the remote services.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;
use vcvault_capabilities::Invocation;

use crate::error::{RemoteError, RemoteResult};
use crate::signer::{Controller, sign_request};

/// Build the HTTP client shared by the KMS and EDV clients.
///
/// `timeout` bounds every request end to end.
///
/// # Errors
///
/// Returns [`RemoteError::Http`] if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> RemoteResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| RemoteError::Http {
            endpoint: "client builder".into(),
            source,
        })
}

/// `METHOD path` label used in errors and logs.
pub(crate) fn endpoint(method: &str, url: &Url) -> String {
    format!("{method} {}", url.path())
}

/// Append path segments to a URL given as a string.
pub(crate) fn join(base: &str, suffix: &str) -> RemoteResult<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        suffix.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| RemoteError::InvalidUrl(format!("{joined}: {e}")))
}

/// Build, sign and send one request.
pub(crate) async fn send_signed(
    http: &Client,
    builder: RequestBuilder,
    controller: &Controller,
    invocation: Option<&Invocation>,
    endpoint: &str,
) -> RemoteResult<Response> {
    let mut request = builder.build().map_err(|source| RemoteError::Http {
        endpoint: endpoint.to_string(),
        source,
    })?;
    sign_request(&mut request, controller, invocation)?;

    tracing::debug!(endpoint, action = invocation.map(|i| i.action.as_str()), "remote call");

    http.execute(request)
        .await
        .map_err(|source| RemoteError::Http {
            endpoint: endpoint.to_string(),
            source,
        })
}

/// Turn a non-success response into [`RemoteError::Api`].
pub(crate) async fn ensure_success(resp: Response, endpoint: &str) -> RemoteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound {
            endpoint: endpoint.to_string(),
        });
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|e| format!("(failed to read response body: {e})"));
    Err(RemoteError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Check the status and decode a JSON body.
pub(crate) async fn expect_json<T: DeserializeOwned>(
    resp: Response,
    endpoint: &str,
) -> RemoteResult<T> {
    ensure_success(resp, endpoint)
        .await?
        .json()
        .await
        .map_err(|source| RemoteError::Deserialization {
            endpoint: endpoint.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalises_slashes() {
        assert_eq!(
            join("https://kms.example.com/kms/keystores/ks1/", "/keys")
                .unwrap()
                .as_str(),
            "https://kms.example.com/kms/keystores/ks1/keys"
        );
        assert_eq!(
            join("https://kms.example.com/k", "export").unwrap().as_str(),
            "https://kms.example.com/k/export"
        );
    }

    #[test]
    fn test_join_rejects_relative_base() {
        assert!(matches!(
            join("/kms/keystores", "keys"),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_label() {
        let url: Url = "https://edv.example.com/encrypted-data-vaults?x=1"
            .parse()
            .unwrap();
        assert_eq!(endpoint("POST", &url), "POST /encrypted-data-vaults");
    }
}
