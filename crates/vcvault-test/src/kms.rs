//! In-process fake of the remote key-management service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;
use vcvault_capabilities::{Capability, InvocationTarget, SECURITY_CONTEXT, actions, compress};
use vcvault_crypto::X25519Secret;
use vcvault_crypto::encoding::encode_b64url;
use vcvault_remote::kms::{
    CONTENT_KEY_TYPE, CreateKeyRequest, CreateKeyResponse, CreateKeyStoreRequest,
    CreateKeyStoreResponse, ExportKeyResponse, UnwrapKeyRequest, UnwrapKeyResponse,
};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::auth::{Call, authorize, json_body, lock, signer, status};

/// Invocation-target type of key store capabilities.
pub const KEYSTORE_TARGET_TYPE: &str = "urn:kms:keystore";

#[derive(Default)]
struct KmsState {
    /// Key store id -> controller DID.
    key_stores: HashMap<String, String>,
    /// Key path -> secret.
    keys: HashMap<String, X25519Secret>,
    calls: Vec<Call>,
    fail_key_creation: bool,
}

struct KmsResponder {
    state: Arc<Mutex<KmsState>>,
}

impl KmsResponder {
    fn route(&self, request: &Request) -> Result<ResponseTemplate, ResponseTemplate> {
        let path = request.url.path().to_string();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["kms", "keystores"]) => self.create_key_store(request),
            ("POST", ["kms", "keystores", ks, "keys"]) => self.create_key(request, ks),
            ("GET", ["kms", "keystores", ks, "keys", _, "export"]) => {
                self.export_key(request, ks, key_path(&segments))
            },
            ("POST", ["kms", "keystores", ks, "keys", _, "unwrap"]) => {
                self.unwrap_key(request, ks, key_path(&segments))
            },
            _ => Err(status(404, format!("no route for {path}"))),
        }
    }

    fn controller(&self, ks: &str) -> Result<String, ResponseTemplate> {
        lock(&self.state)
            .key_stores
            .get(ks)
            .cloned()
            .ok_or_else(|| status(404, format!("unknown key store {ks}")))
    }

    fn create_key_store(&self, request: &Request) -> Result<ResponseTemplate, ResponseTemplate> {
        let signer = signer(request)?;
        let body: CreateKeyStoreRequest = json_body(request)?;
        if signer.did() != body.controller {
            return Err(status(403, "request not signed by the key store controller"));
        }

        let id = Uuid::new_v4().simple().to_string();
        let key_store_url = format!("/kms/keystores/{id}");
        let root = Capability {
            context: Some(serde_json::Value::String(SECURITY_CONTEXT.to_string())),
            id: key_store_url.clone(),
            parent: String::new(),
            controller: Some(body.controller.clone()),
            invoker: signer.verification_method(),
            invocation_target: InvocationTarget {
                id: key_store_url.clone(),
                target_type: KEYSTORE_TARGET_TYPE.to_string(),
            },
            allowed_actions: vec![
                actions::CREATE_KEY.to_string(),
                actions::EXPORT_KEY.to_string(),
                actions::UNWRAP.to_string(),
            ],
            caveats: Vec::new(),
            capability_chain: Vec::new(),
            proof: None,
        };
        let capability = compress(&root).map_err(|e| status(500, e.to_string()))?;

        lock(&self.state).key_stores.insert(id, body.controller);
        Ok(ResponseTemplate::new(201).set_body_json(CreateKeyStoreResponse {
            key_store_url,
            capability,
        }))
    }

    fn create_key(&self, request: &Request, ks: &str) -> Result<ResponseTemplate, ResponseTemplate> {
        let controller = self.controller(ks)?;
        authorize(request, &controller, &format!("/kms/keystores/{ks}"), actions::CREATE_KEY)?;
        let body: CreateKeyRequest = json_body(request)?;
        if body.key_type != CONTENT_KEY_TYPE {
            return Err(status(400, format!("unsupported key type {}", body.key_type)));
        }

        let mut state = lock(&self.state);
        if state.fail_key_creation {
            return Err(status(500, "key creation disabled"));
        }
        let key_url = format!("/kms/keystores/{ks}/keys/{}", Uuid::new_v4().simple());
        state.keys.insert(key_url.clone(), X25519Secret::generate());
        Ok(ResponseTemplate::new(201).set_body_json(CreateKeyResponse { key_url }))
    }

    fn export_key(
        &self,
        request: &Request,
        ks: &str,
        key_path: String,
    ) -> Result<ResponseTemplate, ResponseTemplate> {
        let controller = self.controller(ks)?;
        authorize(request, &controller, &format!("/kms/keystores/{ks}"), actions::EXPORT_KEY)?;

        let state = lock(&self.state);
        let secret = state
            .keys
            .get(&key_path)
            .ok_or_else(|| status(404, format!("unknown key {key_path}")))?;
        Ok(ResponseTemplate::new(200).set_body_json(ExportKeyResponse {
            public_key: encode_b64url(secret.public_key()),
        }))
    }

    fn unwrap_key(
        &self,
        request: &Request,
        ks: &str,
        key_path: String,
    ) -> Result<ResponseTemplate, ResponseTemplate> {
        let controller = self.controller(ks)?;
        authorize(request, &controller, &format!("/kms/keystores/{ks}"), actions::UNWRAP)?;
        let body: UnwrapKeyRequest = json_body(request)?;

        let state = lock(&self.state);
        let secret = state
            .keys
            .get(&key_path)
            .ok_or_else(|| status(404, format!("unknown key {key_path}")))?;
        let cek = body
            .wrapped_key
            .unwrap_key(secret)
            .map_err(|e| status(400, e.to_string()))?;
        Ok(ResponseTemplate::new(200).set_body_json(UnwrapKeyResponse {
            key: encode_b64url(cek.as_bytes()),
        }))
    }
}

/// `/kms/keystores/<ks>/keys/<key>` from a route's segments.
fn key_path(segments: &[&str]) -> String {
    format!("/{}", segments.iter().take(5).copied().collect::<Vec<_>>().join("/"))
}

impl Respond for KmsResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        lock(&self.state).calls.push(Call::from_request(request));
        self.route(request).unwrap_or_else(|rejection| rejection)
    }
}

/// A stateful fake KMS on a local port.
///
/// Key stores are created on demand; their root capabilities use
/// server-relative ids (`/kms/keystores/…`), as real deployments do.
pub struct FakeKms {
    server: MockServer,
    state: Arc<Mutex<KmsState>>,
}

impl std::fmt::Debug for FakeKms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeKms")
            .field("uri", &self.server.uri())
            .finish_non_exhaustive()
    }
}

impl FakeKms {
    /// Start the fake on a random local port.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(KmsState::default()));
        Mock::given(any())
            .respond_with(KmsResponder {
                state: Arc::clone(&state),
            })
            .mount(&server)
            .await;
        Self { server, state }
    }

    /// Root URL of the fake.
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Number of key stores created.
    #[must_use]
    pub fn key_store_count(&self) -> usize {
        lock(&self.state).key_stores.len()
    }

    /// Number of content keys created.
    #[must_use]
    pub fn key_count(&self) -> usize {
        lock(&self.state).keys.len()
    }

    /// Every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    /// Make key creation answer `500` until switched back.
    pub fn fail_key_creation(&self, fail: bool) {
        lock(&self.state).fail_key_creation = fail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_requesting_party;
    use vcvault_remote::{Authority, KmsClient, RemoteError};

    fn client(kms: &FakeKms) -> KmsClient {
        KmsClient::new(reqwest::Client::new(), kms.uri().parse().unwrap())
    }

    #[tokio::test]
    async fn test_controller_can_create_and_export_keys() {
        let kms = FakeKms::start().await;
        let controller = test_requesting_party();
        let key_store = client(&kms).create_key_store(&controller).await.unwrap();
        assert_eq!(kms.key_store_count(), 1);

        let authority = Authority::new(controller, key_store.capability);
        let key_url = client(&kms).create_key(&key_store.url, &authority).await.unwrap();
        let public_key = client(&kms).export_public_key(&key_url, &authority).await.unwrap();
        assert_ne!(public_key, [0u8; 32]);
        assert_eq!(kms.key_count(), 1);
    }

    #[tokio::test]
    async fn test_stranger_cannot_use_root_capability() {
        let kms = FakeKms::start().await;
        let controller = test_requesting_party();
        let key_store = client(&kms).create_key_store(&controller).await.unwrap();

        let stranger = Authority::new(test_requesting_party(), key_store.capability);
        match client(&kms).create_key(&key_store.url, &stranger).await {
            Err(RemoteError::Api { status, .. }) => assert_eq!(status, 403),
            other => panic!("expected 403, got {other:?}"),
        }
        assert_eq!(kms.key_count(), 0);
    }

    #[tokio::test]
    async fn test_unsigned_request_is_rejected() {
        let kms = FakeKms::start().await;
        let resp = reqwest::Client::new()
            .post(format!("{}/kms/keystores", kms.uri()))
            .json(&serde_json::json!({"controller": "did:key:z6Mk"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        assert_eq!(kms.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_key_creation_can_be_failed() {
        let kms = FakeKms::start().await;
        let controller = test_requesting_party();
        let key_store = client(&kms).create_key_store(&controller).await.unwrap();
        let authority = Authority::new(controller, key_store.capability);

        kms.fail_key_creation(true);
        assert!(client(&kms).create_key(&key_store.url, &authority).await.is_err());
        kms.fail_key_creation(false);
        assert!(client(&kms).create_key(&key_store.url, &authority).await.is_ok());
    }
}
