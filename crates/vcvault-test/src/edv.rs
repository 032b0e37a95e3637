//! In-process fake of the remote encrypted data vault.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;
use vcvault_capabilities::{Capability, InvocationTarget, SECURITY_CONTEXT, actions, vault_action};
use vcvault_remote::edv::VAULTS_PATH;
use vcvault_remote::{DataVaultConfiguration, EncryptedDocument};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::auth::{Call, authorize, json_body, lock, signer, status};

/// Invocation-target type of data vault capabilities.
pub const VAULT_TARGET_TYPE: &str = "urn:edv:vault";

struct Vault {
    controller: String,
    documents: HashMap<String, EncryptedDocument>,
}

#[derive(Default)]
struct EdvState {
    vaults: HashMap<String, Vault>,
    calls: Vec<Call>,
    creates: usize,
    updates: usize,
}

struct EdvResponder {
    base_url: String,
    state: Arc<Mutex<EdvState>>,
}

impl EdvResponder {
    fn route(&self, request: &Request) -> Result<ResponseTemplate, ResponseTemplate> {
        let path = request.url.path().to_string();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["encrypted-data-vaults"]) => self.create_vault(request),
            ("POST", ["encrypted-data-vaults", vid, "documents"]) => {
                self.create_document(request, vid)
            },
            ("GET", ["encrypted-data-vaults", vid, "documents", id]) => {
                self.read_document(request, vid, id)
            },
            ("POST", ["encrypted-data-vaults", vid, "documents", id]) => {
                self.update_document(request, vid, id)
            },
            _ => Err(status(404, format!("no route for {path}"))),
        }
    }

    fn authorize_vault(
        &self,
        request: &Request,
        vid: &str,
    ) -> Result<Capability, ResponseTemplate> {
        let controller = lock(&self.state)
            .vaults
            .get(vid)
            .map(|v| v.controller.clone())
            .ok_or_else(|| status(404, format!("unknown vault {vid}")))?;
        authorize(
            request,
            &controller,
            &format!("{VAULTS_PATH}/{vid}"),
            vault_action(request.method.as_str()),
        )
    }

    fn create_vault(&self, request: &Request) -> Result<ResponseTemplate, ResponseTemplate> {
        let signer = signer(request)?;
        let config: DataVaultConfiguration = json_body(request)?;
        if signer.did() != config.controller {
            return Err(status(403, "request not signed by the vault controller"));
        }

        let vid = Uuid::new_v4().simple().to_string();
        let location = format!("{VAULTS_PATH}/{vid}");
        let vault_url = format!("{}{location}", self.base_url);
        let root = Capability {
            context: Some(serde_json::Value::String(SECURITY_CONTEXT.to_string())),
            id: vault_url.clone(),
            parent: String::new(),
            controller: Some(config.controller.clone()),
            invoker: signer.verification_method(),
            invocation_target: InvocationTarget {
                id: vault_url,
                target_type: VAULT_TARGET_TYPE.to_string(),
            },
            allowed_actions: vec![actions::READ.to_string(), actions::WRITE.to_string()],
            caveats: Vec::new(),
            capability_chain: Vec::new(),
            proof: None,
        };

        lock(&self.state).vaults.insert(
            vid,
            Vault {
                controller: config.controller,
                documents: HashMap::new(),
            },
        );
        Ok(ResponseTemplate::new(201)
            .insert_header("Location", location.as_str())
            .set_body_json(root))
    }

    fn create_document(
        &self,
        request: &Request,
        vid: &str,
    ) -> Result<ResponseTemplate, ResponseTemplate> {
        self.authorize_vault(request, vid)?;
        let document: EncryptedDocument = json_body(request)?;

        let mut state = lock(&self.state);
        let vault = state
            .vaults
            .get_mut(vid)
            .ok_or_else(|| status(404, format!("unknown vault {vid}")))?;
        if vault.documents.contains_key(&document.id) {
            return Err(status(409, "duplicate document"));
        }
        let location = format!("{VAULTS_PATH}/{vid}/documents/{}", document.id);
        vault.documents.insert(document.id.clone(), document);
        state.creates = state.creates.saturating_add(1);
        Ok(ResponseTemplate::new(201).insert_header("Location", location.as_str()))
    }

    fn read_document(
        &self,
        request: &Request,
        vid: &str,
        id: &str,
    ) -> Result<ResponseTemplate, ResponseTemplate> {
        self.authorize_vault(request, vid)?;
        let state = lock(&self.state);
        state
            .vaults
            .get(vid)
            .and_then(|v| v.documents.get(id))
            .map(|doc| ResponseTemplate::new(200).set_body_json(doc))
            .ok_or_else(|| status(404, format!("unknown document {id}")))
    }

    fn update_document(
        &self,
        request: &Request,
        vid: &str,
        id: &str,
    ) -> Result<ResponseTemplate, ResponseTemplate> {
        self.authorize_vault(request, vid)?;
        let document: EncryptedDocument = json_body(request)?;
        if document.id != id {
            return Err(status(400, "document id does not match path"));
        }

        let mut state = lock(&self.state);
        let slot = state
            .vaults
            .get_mut(vid)
            .and_then(|v| v.documents.get_mut(id))
            .ok_or_else(|| status(404, format!("unknown document {id}")))?;
        *slot = document;
        state.updates = state.updates.saturating_add(1);
        Ok(ResponseTemplate::new(200))
    }
}

impl Respond for EdvResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        lock(&self.state).calls.push(Call::from_request(request));
        self.route(request).unwrap_or_else(|rejection| rejection)
    }
}

/// A stateful fake EDV on a local port.
///
/// Vault creation answers with a server-relative `Location` and an absolute
/// root capability allowing `read` and `write`.
pub struct FakeEdv {
    server: MockServer,
    state: Arc<Mutex<EdvState>>,
}

impl std::fmt::Debug for FakeEdv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeEdv")
            .field("uri", &self.server.uri())
            .finish_non_exhaustive()
    }
}

impl FakeEdv {
    /// Start the fake on a random local port.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(EdvState::default()));
        Mock::given(any())
            .respond_with(EdvResponder {
                base_url: server.uri(),
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

    /// Number of vaults created.
    #[must_use]
    pub fn vault_count(&self) -> usize {
        lock(&self.state).vaults.len()
    }

    /// Number of documents stored in a vault.
    #[must_use]
    pub fn document_count(&self, vault_id: &str) -> usize {
        lock(&self.state)
            .vaults
            .get(vault_id)
            .map_or(0, |v| v.documents.len())
    }

    /// A stored document, as the EDV sees it.
    #[must_use]
    pub fn document(&self, vault_id: &str, doc_id: &str) -> Option<EncryptedDocument> {
        lock(&self.state)
            .vaults
            .get(vault_id)
            .and_then(|v| v.documents.get(doc_id))
            .cloned()
    }

    /// Number of successful document creations.
    #[must_use]
    pub fn create_count(&self) -> usize {
        lock(&self.state).creates
    }

    /// Number of successful document updates.
    #[must_use]
    pub fn update_count(&self) -> usize {
        lock(&self.state).updates
    }

    /// Every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_requesting_party;
    use vcvault_capabilities::compress;
    use vcvault_crypto::Envelope;
    use vcvault_remote::edv::vault_uri;
    use vcvault_remote::{Authority, EdvClient, RemoteError};

    fn client(edv: &FakeEdv) -> EdvClient {
        EdvClient::new(reqwest::Client::new(), edv.uri().parse().unwrap())
    }

    fn document(id: &str) -> EncryptedDocument {
        EncryptedDocument {
            id: id.into(),
            sequence: 0,
            jwe: Envelope::seal(b"{}", "kid", &[9u8; 32]).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let edv = FakeEdv::start().await;
        let controller = test_requesting_party();
        let created = client(&edv)
            .create_data_vault(&controller, &DataVaultConfiguration::new(controller.did().did()))
            .await
            .unwrap();
        let uri = vault_uri(&created.location).unwrap();
        let authority = Authority::new(controller, compress(&created.capability).unwrap());

        let doc = document("z1");
        client(&edv).create_document(&uri, &doc, &authority).await.unwrap();
        assert!(matches!(
            client(&edv).create_document(&uri, &doc, &authority).await,
            Err(RemoteError::DuplicateDocument { .. })
        ));
        client(&edv).update_document(&uri, &doc, &authority).await.unwrap();

        let read = client(&edv).read_document(&uri, "z1", &authority).await.unwrap();
        assert_eq!(read, doc);
        assert_eq!(edv.create_count(), 1);
        assert_eq!(edv.update_count(), 1);
        assert!(matches!(
            client(&edv).read_document(&uri, "z2", &authority).await,
            Err(RemoteError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_vault_creation_must_be_signed_by_controller() {
        let edv = FakeEdv::start().await;
        let config = DataVaultConfiguration::new(test_requesting_party().did().did());
        let err = client(&edv)
            .create_data_vault(&test_requesting_party(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 403, .. }), "{err}");
        assert_eq!(edv.vault_count(), 0);
    }
}
