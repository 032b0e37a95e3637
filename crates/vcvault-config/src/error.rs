//! Configuration error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or validating a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config file is not valid TOML.
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        /// The file, or `<embedded defaults>`.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file is larger than the loader accepts.
    #[error("{} is {size} bytes, over the {limit} byte limit", path.display())]
    TooLarge {
        /// The file.
        path: PathBuf,
        /// File size in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        limit: u64,
    },

    /// The merged layers do not form a valid [`Config`](crate::Config), e.g.
    /// a wrongly typed value or an unknown enum variant.
    #[error("merged configuration is malformed: {0}")]
    Malformed(#[source] toml::de::Error),

    /// A field holds a value the client cannot use.
    #[error("invalid {field}: {message}")]
    Invalid {
        /// Dotted field path, e.g. `kms.url`.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
