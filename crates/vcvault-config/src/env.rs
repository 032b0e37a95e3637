//! Environment variable fallbacks.
//!
//! Variables are a **fallback**, not an override: they only fill fields that
//! no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, FieldSources};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `VCVAULT_*` variables.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "VCVAULT_KMS_URL",
        field_path: "kms.url",
    },
    EnvMapping {
        var_name: "VCVAULT_EDV_URL",
        field_path: "edv.url",
    },
    EnvMapping {
        var_name: "VCVAULT_HTTP_TIMEOUT_SECS",
        field_path: "http.timeout_secs",
    },
    EnvMapping {
        var_name: "VCVAULT_STORAGE_BACKEND",
        field_path: "storage.backend",
    },
    EnvMapping {
        var_name: "VCVAULT_STORAGE_PATH",
        field_path: "storage.path",
    },
    EnvMapping {
        var_name: "VCVAULT_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "VCVAULT_LOG_FORMAT",
        field_path: "logging.format",
    },
];

/// Apply environment variable fallbacks to fields that no config file set.
///
/// Fields that only carry their embedded default are eligible. Returns the
/// number of variables applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if sources
            .get(mapping.field_path)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );
            set_field_from_string(merged, mapping.field_path, val);
            sources.insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
            count = count.saturating_add(1);
        }
    }

    count
}

/// Set a dotted field in the TOML tree, creating intermediate tables.
fn set_field_from_string(root: &mut toml::Value, path: &str, val: &str) {
    let toml_val = coerce_to_toml_value(path, val);
    let Some((parents, leaf)) = path.rsplit_once('.') else {
        if let Some(table) = root.as_table_mut() {
            table.insert(path.to_owned(), toml_val);
        }
        return;
    };

    let mut current = root;
    for segment in parents.split('.') {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), toml_val);
    }
}

/// Coerce a variable to the TOML type of its field.
fn coerce_to_toml_value(path: &str, val: &str) -> toml::Value {
    if path == "http.timeout_secs"
        && let Ok(i) = val.parse::<i64>()
    {
        return toml::Value::Integer(i);
    }
    toml::Value::String(val.to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_fallback_fills_default_field() {
        let mut merged: toml::Value = toml::from_str("[kms]\nurl = \"http://localhost:8078\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("kms.url".to_owned(), ConfigLayer::Defaults);
        let env = make_env(&[("VCVAULT_KMS_URL", "https://kms.example.com")]);

        let count = apply_env_fallbacks(&mut merged, &mut sources, &env);

        assert_eq!(count, 1);
        assert_eq!(merged["kms"]["url"].as_str(), Some("https://kms.example.com"));
        assert_eq!(sources.get("kms.url"), Some(&ConfigLayer::Environment));
    }

    #[test]
    fn test_fallback_skips_file_set_field() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);
        let env = make_env(&[("VCVAULT_LOG_LEVEL", "debug")]);

        assert_eq!(apply_env_fallbacks(&mut merged, &mut sources, &env), 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_fallback_creates_missing_tables() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let mut sources = FieldSources::new();
        let env = make_env(&[("VCVAULT_STORAGE_PATH", "/var/lib/vcvault")]);

        apply_env_fallbacks(&mut merged, &mut sources, &env);
        assert_eq!(merged["storage"]["path"].as_str(), Some("/var/lib/vcvault"));
    }

    #[test]
    fn test_coerce_timeout_to_integer() {
        assert_eq!(
            coerce_to_toml_value("http.timeout_secs", "30").as_integer(),
            Some(30)
        );
        assert_eq!(
            coerce_to_toml_value("http.timeout_secs", "soon").as_str(),
            Some("soon")
        );
        assert_eq!(coerce_to_toml_value("edv.url", "30").as_str(), Some("30"));
    }
}
