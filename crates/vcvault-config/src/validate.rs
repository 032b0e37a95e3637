//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, StorageBackend};

/// Longest accepted request timeout (ten minutes).
const MAX_TIMEOUT_SECS: u64 = 600;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_service_url("kms.url", &config.kms.url)?;
    validate_service_url("edv.url", &config.edv.url)?;
    validate_http(config)?;
    validate_storage(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_service_url(field: &str, raw: &str) -> ConfigResult<()> {
    let url = url::Url::parse(raw).map_err(|e| invalid(field, format!("'{raw}' is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            format!("unsupported scheme '{}'; expected http or https", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(invalid(field, format!("'{raw}' has no host")));
    }
    Ok(())
}

fn validate_http(config: &Config) -> ConfigResult<()> {
    let secs = config.http.timeout_secs;
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            "http.timeout_secs",
            format!("timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
        ));
    }
    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    if config.storage.backend == StorageBackend::Kv && config.storage.path.is_none() {
        return Err(invalid(
            "storage.path",
            "the kv backend needs a database directory",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    match config.logging.target.as_str() {
        "stdout" | "stderr" => Ok(()),
        "file" if config.logging.directory.is_some() => Ok(()),
        "file" => Err(invalid(
            "logging.directory",
            "the file target needs a log directory",
        )),
        other => Err(invalid(
            "logging.target",
            format!("unsupported log target '{other}'; expected one of: stdout, stderr, file"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let mut config = Config::default();
        config.kms.url = "ftp://kms.example.com".into();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("kms.url"), "{err}");
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let mut config = Config::default();
        config.edv.url = "edv.example.com".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(validate(&config).is_err());
        config.http.timeout_secs = 601;
        assert!(validate(&config).is_err());
        config.http.timeout_secs = 600;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_kv_backend_requires_path() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Kv;
        assert!(validate(&config).is_err());
        config.storage.path = Some("/tmp/vcvault".into());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_file_target_requires_directory() {
        let mut config = Config::default();
        config.logging.target = "file".into();
        assert!(validate(&config).is_err());
        config.logging.directory = Some("/var/log/vcvault".into());
        assert!(validate(&config).is_ok());
    }
}
