//! Configuration types.
//!
//! This module provides the top-level [`SymeConfig`] struct, its sections and
//! its builder.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use syme_telemetry::LogConfig;

use crate::ConfigError;

/// Longest accepted cache freshness lifetime: one year.
pub const MAX_CACHE_DELAY_SECS: u64 = 365 * 24 * 60 * 60;

/// Largest accepted asset transfer chunk: 8 MiB.
pub const MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Complete Syme application configuration.
///
/// Every section may be omitted from a configuration file; missing sections
/// and fields take their defaults. Unknown fields are rejected.
///
/// # Example
///
/// ```
/// use syme_config::SymeConfig;
///
/// let config = SymeConfig::default();
/// assert_eq!(config.application.name, "Syme");
/// assert_eq!(config.assets.chunk_size(), 16 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct SymeConfig {
    /// Application identity and mount point.
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Listening socket.
    #[serde(default)]
    pub server: ServerConfig,

    /// Static asset delivery.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Conditional request handling.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Response body compression.
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LogConfig,
}

/// Application identity and mount point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    /// Application name, used in `X-Powered-By`.
    #[serde(default = "default_name")]
    pub name: String,

    /// Application version, used in `X-Powered-By`.
    #[serde(default = "default_version")]
    pub version: String,

    /// Debug mode.
    #[serde(default)]
    pub debug: bool,

    /// Path prefix the application is mounted under. Must start with `/`.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Emit `X-Powered-By: <name>/<version>` on negotiated responses.
    #[serde(default = "default_true")]
    pub powered_by: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            debug: false,
            root_path: default_root_path(),
            powered_by: true,
        }
    }
}

impl ApplicationConfig {
    /// `<name>/<version>`.
    pub fn signature(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Listening socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// IP address to bind.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// TCP port to bind.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Scheme assumed when the request does not carry one.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            http_port: default_http_port(),
            scheme: default_scheme(),
        }
    }
}

impl ServerConfig {
    /// Address and port as a socket address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `http_addr` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.http_addr.parse().map_err(|_| {
            ConfigError::invalid(
                "server.http_addr",
                format!("invalid IP address: {}", self.http_addr),
            )
        })?;
        Ok(SocketAddr::new(ip, self.http_port))
    }
}

/// Static asset delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AssetsConfig {
    /// Directory served for requests that name an existing file.
    #[serde(default = "default_assets_path")]
    pub path: PathBuf,

    /// Base packet size in bytes.
    #[serde(default = "default_packet_size")]
    pub packet_size: usize,

    /// Packets per transfer chunk.
    #[serde(default = "default_packet_multiplier")]
    pub packet_multiplier: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            path: default_assets_path(),
            packet_size: default_packet_size(),
            packet_multiplier: default_packet_multiplier(),
        }
    }
}

impl AssetsConfig {
    /// Bytes written per transfer chunk.
    pub const fn chunk_size(&self) -> usize {
        self.packet_size.saturating_mul(self.packet_multiplier)
    }
}

/// Conditional request handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Answer matching conditional requests with 304.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Freshness lifetime in seconds.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: default_delay_secs(),
        }
    }
}

/// Response body compression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Gzip bodies when the client accepts it.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Smallest body, in bytes, worth compressing.
    #[serde(default = "default_min_size")]
    pub min_size: usize,

    /// Gzip level, 0 to 9.
    #[serde(default = "default_level")]
    pub level: u32,

    /// Collapse whitespace runs before compressing.
    #[serde(default)]
    pub collapse_whitespace: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_size: default_min_size(),
            level: default_level(),
            collapse_whitespace: false,
        }
    }
}

fn default_name() -> String {
    "Syme".to_string()
}

fn default_version() -> String {
    "0.1.0-dev".to_string()
}

fn default_root_path() -> String {
    "/".to_string()
}

fn default_http_addr() -> String {
    "0.0.0.0".to_string()
}

const fn default_http_port() -> u16 {
    8080
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_assets_path() -> PathBuf {
    PathBuf::from("./public")
}

const fn default_packet_size() -> usize {
    1024
}

const fn default_packet_multiplier() -> usize {
    16
}

const fn default_delay_secs() -> u64 {
    3600
}

const fn default_min_size() -> usize {
    2048
}

const fn default_level() -> u32 {
    9
}

const fn default_true() -> bool {
    true
}

impl SymeConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use syme_config::{CacheConfig, SymeConfig};
    ///
    /// let config = SymeConfig::builder()
    ///     .cache(CacheConfig { enabled: false, ..Default::default() })
    ///     .build();
    ///
    /// assert!(!config.cache.enabled);
    /// ```
    #[must_use]
    pub fn builder() -> SymeConfigBuilder {
        SymeConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - the server address is not an IP address or the port is zero
    /// - the root path does not start with `/`
    /// - the packet size or multiplier is zero
    /// - a transfer chunk would exceed [`MAX_CHUNK_SIZE`]
    /// - the cache delay exceeds [`MAX_CACHE_DELAY_SECS`]
    /// - the compression level is above 9
    /// - the log level is not a valid filter directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;

        if self.server.http_port == 0 {
            return Err(ConfigError::invalid("server.http_port", "must be greater than zero"));
        }

        if !self.application.root_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "application.root_path",
                format!("must start with '/': {}", self.application.root_path),
            ));
        }

        if self.assets.packet_size == 0 {
            return Err(ConfigError::invalid("assets.packet_size", "must be greater than zero"));
        }

        if self.assets.packet_multiplier == 0 {
            return Err(ConfigError::invalid(
                "assets.packet_multiplier",
                "must be greater than zero",
            ));
        }

        match self.assets.packet_size.checked_mul(self.assets.packet_multiplier) {
            Some(chunk) if chunk <= MAX_CHUNK_SIZE => {}
            _ => {
                return Err(ConfigError::invalid(
                    "assets.packet_multiplier",
                    format!(
                        "packet_size * packet_multiplier must not exceed {MAX_CHUNK_SIZE} bytes"
                    ),
                ));
            }
        }

        if self.cache.delay_secs > MAX_CACHE_DELAY_SECS {
            return Err(ConfigError::invalid(
                "cache.delay_secs",
                format!(
                    "must be at most {MAX_CACHE_DELAY_SECS}, got {}",
                    self.cache.delay_secs
                ),
            ));
        }

        if self.compression.level > 9 {
            return Err(ConfigError::invalid(
                "compression.level",
                format!("must be between 0 and 9, got {}", self.compression.level),
            ));
        }

        if let Err(e) = syme_telemetry::create_env_filter(&self.logging.level) {
            return Err(ConfigError::invalid("logging.level", e.to_string()));
        }

        Ok(())
    }

    /// Development preset.
    ///
    /// - Debug mode on
    /// - Pretty debug-level logs with source locations
    /// - Conditional 304 answers disabled, so edits always show up
    ///
    /// # Example
    ///
    /// ```
    /// use syme_config::SymeConfig;
    ///
    /// let config = SymeConfig::development();
    /// assert!(config.application.debug);
    /// assert!(!config.cache.enabled);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        Self {
            application: ApplicationConfig {
                debug: true,
                ..ApplicationConfig::default()
            },
            cache: CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Production preset.
    ///
    /// - JSON logs at `info`
    /// - `X-Powered-By` suppressed
    ///
    /// # Example
    ///
    /// ```
    /// use syme_config::SymeConfig;
    ///
    /// let config = SymeConfig::production();
    /// assert!(!config.application.powered_by);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        Self {
            application: ApplicationConfig {
                powered_by: false,
                ..ApplicationConfig::default()
            },
            logging: LogConfig::production(),
            ..Self::default()
        }
    }
}

/// Builder for [`SymeConfig`].
#[derive(Debug, Default)]
pub struct SymeConfigBuilder {
    config: SymeConfig,
}

impl SymeConfigBuilder {
    /// Create a builder holding the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application section.
    #[must_use]
    pub fn application(mut self, application: ApplicationConfig) -> Self {
        self.config.application = application;
        self
    }

    /// Set the server section.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Set the assets section.
    #[must_use]
    pub fn assets(mut self, assets: AssetsConfig) -> Self {
        self.config.assets = assets;
        self
    }

    /// Set the cache section.
    #[must_use]
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Set the compression section.
    #[must_use]
    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build the configuration without validating it.
    #[must_use]
    pub fn build(self) -> SymeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SymeConfig::default();
        assert_eq!(config.application.name, "Syme");
        assert_eq!(config.application.version, "0.1.0-dev");
        assert_eq!(config.application.root_path, "/");
        assert_eq!(config.server.socket_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.assets.path, PathBuf::from("./public"));
        assert_eq!(config.assets.chunk_size(), 16_384);
        assert_eq!(config.cache.delay_secs, 3600);
        assert_eq!(config.compression.min_size, 2048);
        assert_eq!(config.compression.level, 9);
        assert!(!config.compression.collapse_whitespace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_signature() {
        assert_eq!(ApplicationConfig::default().signature(), "Syme/0.1.0-dev");
    }

    #[test]
    fn test_validate_rejects_zero_packet_size() {
        let mut config = SymeConfig::default();
        config.assets.packet_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("assets.packet_size"));
    }

    #[test]
    fn test_validate_rejects_oversized_chunk() {
        let mut config = SymeConfig::default();
        config.assets.packet_multiplier = usize::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("assets.packet_multiplier"));

        config.assets.packet_size = 1024;
        config.assets.packet_multiplier = MAX_CHUNK_SIZE / 1024;
        assert!(config.validate().is_ok());

        config.assets.packet_multiplier += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_cache_delay() {
        let mut config = SymeConfig::default();
        config.cache.delay_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.delay_secs"));

        config.cache.delay_secs = MAX_CACHE_DELAY_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = SymeConfig::default();
        config.server.http_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let mut config = SymeConfig::default();
        config.server.http_addr = "example.org".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_validate_rejects_compression_level() {
        let mut config = SymeConfig::default();
        config.compression.level = 10;
        assert!(config.validate().is_err());
        config.compression.level = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_root() {
        let mut config = SymeConfig::default();
        config.application.root_path = "app".into();
        assert!(config.validate().is_err());
        config.application.root_path = "/app".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_log_level() {
        let mut config = SymeConfig::default();
        config.logging.level = "syme=loud".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(SymeConfig::development().validate().is_ok());
        assert!(SymeConfig::production().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SymeConfig::builder()
            .server(ServerConfig {
                http_port: 3000,
                ..Default::default()
            })
            .compression(CompressionConfig {
                enabled: false,
                ..Default::default()
            })
            .build();
        assert_eq!(config.server.http_port, 3000);
        assert!(!config.compression.enabled);
        assert!(config.cache.enabled);
    }
}
