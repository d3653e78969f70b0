//! Structured logging for Syme.
//!
//! Every Syme crate logs through `tracing` macros with structured fields.
//! This crate installs the subscriber that renders them:
//!
//! - **Json**: one JSON object per event, for production
//! - **Pretty**: multi-line human-readable output, for development
//! - **Compact**: single-line human-readable output
//!
//! `RUST_LOG`, when set, takes precedence over the configured level.
//!
//! # Example
//!
//! ```rust,ignore
//! use syme_telemetry::{init_logging, LogConfig, LogFormat};
//!
//! let config = LogConfig {
//!     format: LogFormat::Pretty,
//!     ..LogConfig::default()
//! };
//! init_logging(&config)?;
//!
//! tracing::info!(route = "home", status = 200, "dispatched");
//! ```

#![doc(html_root_url = "https://docs.rs/syme-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
