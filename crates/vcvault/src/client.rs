//! The vault client and its connection settings.

use std::sync::Arc;
use std::time::Duration;

use url::Url;
use vcvault_config::Config;
use vcvault_remote::{Controller, EdvClient, KmsClient, http_client};
use vcvault_storage::{KvStore, MemoryKvStore};

use crate::config_bridge;
use crate::error::{VaultError, VaultResult};
use crate::keys::{KeyManager, LocalKeyManager};
use crate::store::MetadataStore;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the remote services live and how long to wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// KMS root URL.
    pub kms_url: Url,
    /// EDV root URL.
    pub edv_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Settings for the given service roots with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if either URL does not parse or is not
    /// `http`/`https`.
    pub fn new(kms_url: &str, edv_url: &str) -> VaultResult<Self> {
        Ok(Self {
            kms_url: parse_service_url("kms", kms_url)?,
            edv_url: parse_service_url("edv", edv_url)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Settings from a loaded [`Config`].
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::new`].
    pub fn from_config(config: &Config) -> VaultResult<Self> {
        config_bridge::to_client_config(config)
    }
}

pub(crate) fn parse_service_url(service: &str, raw: &str) -> VaultResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| VaultError::Config(format!("{service} url {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(VaultError::Config(format!(
            "{service} url {raw:?} must be an http(s) URL with a host"
        )));
    }
    Ok(url)
}

/// Client for creating vaults, delegating access and storing encrypted
/// documents.
///
/// Cheap to clone; clones share the HTTP connection pool, the metadata store
/// and the key manager.
#[derive(Clone)]
pub struct VaultClient {
    pub(crate) kms: KmsClient,
    pub(crate) edv: EdvClient,
    pub(crate) keys: Arc<dyn KeyManager>,
    pub(crate) store: MetadataStore,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("kms", &self.kms.base_url().as_str())
            .field("edv", &self.edv.base_url().as_str())
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Build a client keeping metadata and signing keys in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Remote`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, store: Arc<dyn KvStore>) -> VaultResult<Self> {
        let keys = Arc::new(LocalKeyManager::new(Arc::clone(&store))?);
        Self::with_key_manager(config, store, keys)
    }

    /// Build a client with a custom key manager.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Remote`] if the HTTP client cannot be built.
    pub fn with_key_manager(
        config: &ClientConfig,
        store: Arc<dyn KvStore>,
        keys: Arc<dyn KeyManager>,
    ) -> VaultResult<Self> {
        let http = http_client(config.timeout)?;
        Ok(Self {
            kms: KmsClient::new(http.clone(), config.kms_url.clone()),
            edv: EdvClient::new(http, config.edv_url.clone()),
            keys,
            store: MetadataStore::new(store)?,
        })
    }

    /// Build a client whose state lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Remote`] if the HTTP client cannot be built.
    pub fn in_memory(config: &ClientConfig) -> VaultResult<Self> {
        Self::new(config, Arc::new(MemoryKvStore::new()))
    }

    /// Build a client from a loaded [`Config`], opening the configured
    /// storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] for unusable settings, or
    /// [`VaultError::LocalStore`] if the backend cannot be opened.
    pub fn from_config(config: &Config) -> VaultResult<Self> {
        let client_config = ClientConfig::from_config(config)?;
        let store = config_bridge::open_store(&config.storage)?;
        Self::new(&client_config, store)
    }

    /// The local metadata store.
    #[must_use]
    pub fn metadata(&self) -> &MetadataStore {
        &self.store
    }

    /// The key manager holding vault signing keys.
    #[must_use]
    pub fn key_manager(&self) -> &Arc<dyn KeyManager> {
        &self.keys
    }

    /// The request signer for a vault's signing key.
    pub(crate) async fn controller(&self, kid: &str) -> VaultResult<Controller> {
        Ok(Controller::new(self.keys.signing_key(kid).await?))
    }
}
