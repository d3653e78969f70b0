//! Typed configuration for Syme.
//!
//! This crate provides a strongly-typed configuration system for Syme
//! applications with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`SymeConfig`] holds one section per concern:
//!
//! - [`ApplicationConfig`] - name, version, mount point, `X-Powered-By`
//! - [`ServerConfig`] - listening address, port and default scheme
//! - [`AssetsConfig`] - asset directory and transfer chunk size
//! - [`CacheConfig`] - conditional 304 handling and freshness lifetime
//! - [`CompressionConfig`] - gzip threshold and level
//! - [`LogConfig`](syme_telemetry::LogConfig) - log level and format
//!
//! # Example
//!
//! ```no_run
//! use syme_config::ConfigLoader;
//!
//! # fn main() -> Result<(), syme_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_optional_file("syme.toml")?
//!     .with_default_env()
//!     .load()?;
//!
//! println!("listening on {}", config.server.socket_addr()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [application]
//! name = "Syme"
//! root_path = "/"
//! powered_by = true
//!
//! [server]
//! http_addr = "0.0.0.0"
//! http_port = 8080
//!
//! [assets]
//! path = "./public"
//! packet_size = 1024
//! packet_multiplier = 16
//!
//! [cache]
//! enabled = true
//! delay_secs = 3600
//!
//! [compression]
//! enabled = true
//! min_size = 2048
//! level = 9
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `SYME__SERVER__HTTP_PORT=9000`
//! - `SYME__CACHE__ENABLED=false`
//! - `SYME__LOGGING__FORMAT=pretty`

#![doc(html_root_url = "https://docs.rs/syme-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{
    ApplicationConfig, AssetsConfig, CacheConfig, CompressionConfig, ServerConfig, SymeConfig,
    SymeConfigBuilder, MAX_CACHE_DELAY_SECS, MAX_CHUNK_SIZE,
};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use syme_telemetry::{LogConfig, LogFormat};
