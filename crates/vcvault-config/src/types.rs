//! Configuration types for the vault client.
//!
//! Every struct implements [`Default`] matching `defaults.toml`, so a bare
//! `[section]` header in TOML produces a working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote key-management service.
    pub kms: ServiceSection,
    /// Remote encrypted data vault.
    pub edv: ServiceSection,
    /// Outbound HTTP settings.
    pub http: HttpSection,
    /// Local metadata storage.
    pub storage: StorageSection,
    /// Logging level, format and destination.
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kms: ServiceSection::new("http://localhost:8078"),
            edv: ServiceSection::new("http://localhost:8081"),
            http: HttpSection::default(),
            storage: StorageSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// Location of a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSection {
    /// Root URL of the service (`http` or `https`).
    pub url: String,
}

impl ServiceSection {
    /// A service rooted at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Metadata storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit.
    #[default]
    Memory,
    /// Durable SurrealKV database at [`StorageSection::path`].
    Kv,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Kv => write!(f, "kv"),
        }
    }
}

/// Local metadata storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Which backend to use.
    pub backend: StorageBackend,
    /// Database directory; required for the `kv` backend.
    pub path: Option<PathBuf>,
}

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Destination: `"stdout"`, `"stderr"` or `"file"`.
    pub target: String,
    /// Log directory for the `file` target.
    pub directory: Option<PathBuf>,
    /// Per-crate tracing directives (e.g. `["vcvault_remote=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            target: "stderr".to_owned(),
            directory: None,
            directives: Vec::new(),
        }
    }
}
