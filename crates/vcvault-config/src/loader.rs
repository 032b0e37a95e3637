//! Config file discovery and layered loading.
//!
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.vcvault/config.toml` (user)
//! 3. Merge the explicit config file, if one was given
//! 4. Apply `VCVAULT_*` fallbacks for fields no file set
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, record_leaves};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration plus where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Source layer of every leaf field.
    pub field_sources: FieldSources,
    /// Files that contributed, in merge order.
    pub loaded_files: Vec<String>,
}

/// Load configuration from the process environment.
///
/// `explicit` is an optional config file merged last; `home_override`
/// replaces the user's home directory for discovery of
/// `.vcvault/config.toml`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final configuration fails validation.
pub fn load(explicit: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<ResolvedConfig> {
    let home = match home_override {
        Some(h) => Some(h.to_path_buf()),
        None => directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()),
    };
    load_with_env(explicit, home.as_deref(), &collect_env_vars())
}

/// Load configuration with an explicit environment map.
///
/// A missing home directory only skips the user layer.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    explicit: Option<&Path>,
    home: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<embedded defaults>"),
            source,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    let user_path = home.map(|h| h.join(".vcvault").join("config.toml"));
    let layers = [
        (user_path, ConfigLayer::User),
        (explicit.map(Path::to_path_buf), ConfigLayer::Explicit),
    ];
    for (path, layer) in layers {
        let Some(path) = path else { continue };
        let overlay = if layer == ConfigLayer::Explicit {
            Some(read_file(&path)?)
        } else {
            try_load_file(&path)?
        };
        if let Some(overlay) = overlay {
            deep_merge_tracking(&mut merged, &overlay, "", &layer, &mut field_sources);
            info!(path = %path.display(), layer = %layer, "loaded config");
            loaded_files.push(path.display().to_string());
        }
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let config: Config = merged.try_into().map_err(ConfigError::Malformed)?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a single file on top of the defaults (no env, no
/// user layer).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    load_with_env(Some(path), None, &HashMap::new()).map(|resolved| resolved.config)
}

/// Read a file that must exist.
fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bounded(path, &content)
}

/// Try to load a file, returning `None` if it doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_bounded(path, &content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            Ok(None)
        },
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn parse_bounded(path: &Path, content: &str) -> ConfigResult<toml::Value> {
    if u64::try_from(content.len()).unwrap_or(u64::MAX) > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.to_path_buf(),
            size: content.len(),
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }
    toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageBackend;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_defaults_match_default_impl() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_defaults_only() {
        let resolved = load_with_env(None, None, &env(&[])).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("http.timeout_secs"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_user_then_explicit_precedence() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".vcvault")).unwrap();
        std::fs::write(
            home.path().join(".vcvault/config.toml"),
            "[kms]\nurl = \"https://kms.user.example\"\n[http]\ntimeout_secs = 10\n",
        )
        .unwrap();

        let explicit = home.path().join("vault.toml");
        std::fs::write(&explicit, "[http]\ntimeout_secs = 20\n").unwrap();

        let resolved = load_with_env(Some(&explicit), Some(home.path()), &env(&[])).unwrap();
        assert_eq!(resolved.config.kms.url, "https://kms.user.example");
        assert_eq!(resolved.config.http.timeout_secs, 20);
        assert_eq!(resolved.loaded_files.len(), 2);
        assert_eq!(
            resolved.field_sources.get("http.timeout_secs"),
            Some(&ConfigLayer::Explicit)
        );
    }

    #[test]
    fn test_env_is_fallback_only() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("vault.toml");
        std::fs::write(&explicit, "[edv]\nurl = \"https://edv.file.example\"\n").unwrap();

        let vars = env(&[
            ("VCVAULT_EDV_URL", "https://edv.env.example"),
            ("VCVAULT_KMS_URL", "https://kms.env.example"),
            ("VCVAULT_HTTP_TIMEOUT_SECS", "5"),
        ]);
        let config = load_with_env(Some(&explicit), None, &vars).unwrap().config;

        assert_eq!(config.edv.url, "https://edv.file.example");
        assert_eq!(config.kms.url, "https://kms.env.example");
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn test_kv_backend_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("vault.toml");
        std::fs::write(
            &explicit,
            "[storage]\nbackend = \"kv\"\npath = \"/var/lib/vcvault\"\n",
        )
        .unwrap();

        let config = load_file(&explicit).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Kv);
        assert_eq!(
            config.storage.path.as_deref(),
            Some(Path::new("/var/lib/vcvault"))
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = load_file(Path::new("/nonexistent/vault.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_missing_user_file_is_skipped() {
        let home = tempfile::tempdir().unwrap();
        assert!(load_with_env(None, Some(home.path()), &env(&[])).is_ok());
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("vault.toml");
        std::fs::write(&explicit, "[http\ntimeout_secs = ").unwrap();
        assert!(matches!(
            load_file(&explicit),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::TooLarge { .. })),
            "expected TooLarge for oversized config, got: {result:?}"
        );
    }
}
