//! vcvault Telemetry - logging setup for the vault client.
//!
//! # Example
//!
//! ```rust,no_run
//! use vcvault_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), vcvault_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Json)
//!     .with_directive("vcvault_remote=trace");
//!
//! setup_logging(&config)?;
//! tracing::info!("vault client starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
