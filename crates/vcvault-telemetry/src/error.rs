//! Telemetry error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from building or installing the log subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A log level, filter directive, format or target was rejected.
    #[error("invalid logging setting: {0}")]
    InvalidSetting(String),

    /// The log directory could not be created.
    #[error("cannot create log directory {}: {source}", dir.display())]
    LogDirectory {
        /// The directory.
        dir: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("logging already initialised: {0}")]
    AlreadyInitialized(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
