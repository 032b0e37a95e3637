//! Bridge from `vcvault_config::Config` to client types.
//!
//! The config crate has no dependencies on other internal crates; this module
//! turns its sections into the settings, store and logger the client uses.

use std::sync::Arc;
use std::time::Duration;

use vcvault_config::{Config, StorageBackend, StorageSection};
use vcvault_storage::{KvStore, MemoryKvStore};
use vcvault_telemetry::{LogConfig, setup_logging};

use crate::client::{ClientConfig, parse_service_url};
use crate::error::{VaultError, VaultResult};

/// Convert config to [`ClientConfig`].
///
/// # Errors
///
/// Returns [`VaultError::Config`] if a service URL is unusable.
pub fn to_client_config(cfg: &Config) -> VaultResult<ClientConfig> {
    Ok(ClientConfig {
        kms_url: parse_service_url("kms", &cfg.kms.url)?,
        edv_url: parse_service_url("edv", &cfg.edv.url)?,
        timeout: Duration::from_secs(cfg.http.timeout_secs),
    })
}

/// Convert config to [`LogConfig`].
///
/// # Errors
///
/// Returns [`VaultError::Config`] for an unknown format or target.
pub fn to_log_config(cfg: &Config) -> VaultResult<LogConfig> {
    LogConfig::try_from(&cfg.logging).map_err(|e| VaultError::Config(e.to_string()))
}

/// Install the global `tracing` subscriber described by `[logging]`.
///
/// # Errors
///
/// Returns [`VaultError::Config`] if the section is invalid or a subscriber
/// is already installed.
pub fn init_logging(cfg: &Config) -> VaultResult<()> {
    setup_logging(&to_log_config(cfg)?).map_err(|e| VaultError::Config(e.to_string()))
}

/// Open the store selected by `[storage]`.
///
/// # Errors
///
/// Returns [`VaultError::Config`] if the `kv` backend is selected without a
/// path or without the `kv` feature, or [`VaultError::LocalStore`] if the
/// database cannot be opened.
pub fn open_store(section: &StorageSection) -> VaultResult<Arc<dyn KvStore>> {
    match section.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryKvStore::new())),
        StorageBackend::Kv => open_kv(section),
    }
}

#[cfg(feature = "kv")]
fn open_kv(section: &StorageSection) -> VaultResult<Arc<dyn KvStore>> {
    let path = section
        .path
        .as_deref()
        .ok_or_else(|| VaultError::Config("storage.path is required for the kv backend".into()))?;
    Ok(Arc::new(vcvault_storage::SurrealKvStore::open(path)?))
}

#[cfg(not(feature = "kv"))]
fn open_kv(_section: &StorageSection) -> VaultResult<Arc<dyn KvStore>> {
    Err(VaultError::Config(
        "storage backend 'kv' requires the 'kv' feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use vcvault_config::ServiceSection;
    use vcvault_telemetry::{LogFormat, LogTarget};

    #[test]
    fn test_default_config_converts() {
        let client = to_client_config(&Config::default()).unwrap();
        assert_eq!(client.kms_url.as_str(), "http://localhost:8078/");
        assert_eq!(client.edv_url.as_str(), "http://localhost:8081/");
        assert_eq!(client.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_service_url_is_config_error() {
        let cfg = Config {
            kms: ServiceSection::new("localhost:8078"),
            ..Config::default()
        };
        assert_eq!(to_client_config(&cfg).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_log_config_follows_section() {
        let mut cfg = Config::default();
        cfg.logging.format = "json".into();
        cfg.logging.target = "stdout".into();
        let log = to_log_config(&cfg).unwrap();
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.target, LogTarget::Stdout);

        cfg.logging.format = "xml".into();
        assert_eq!(to_log_config(&cfg).unwrap_err().kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_memory_backend_opens() {
        let store = open_store(&StorageSection::default()).unwrap();
        store.set("vault", "k", b"v".to_vec()).await.unwrap();
        assert!(store.exists("vault", "k").await.unwrap());
    }

    #[cfg(not(feature = "kv"))]
    #[test]
    fn test_kv_backend_needs_feature() {
        let section = StorageSection {
            backend: StorageBackend::Kv,
            path: Some("/tmp/vcvault".into()),
        };
        assert_eq!(open_store(&section).err().unwrap().kind(), ErrorKind::Config);
    }

    #[cfg(feature = "kv")]
    #[tokio::test]
    async fn test_kv_backend_opens() {
        let dir = tempfile::tempdir().unwrap();
        let section = StorageSection {
            backend: StorageBackend::Kv,
            path: Some(dir.path().join("meta")),
        };
        let store = open_store(&section).unwrap();
        store.set("vault", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("vault", "k").await.unwrap(), Some(b"v".to_vec()));
    }
}
