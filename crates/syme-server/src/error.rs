//! Server-side error types.

use std::io;
use std::path::PathBuf;

use syme_config::ConfigError;
use syme_core::CallError;
use thiserror::Error;

/// Errors raised while binding or running the HTTP boundary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// I/O failure on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configuration does not describe a usable server.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while preparing or streaming a static asset.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The file exists but could not be opened or inspected.
    #[error("cannot open asset {path}: {source}")]
    Open {
        /// Resolved file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading the file failed mid-transfer.
    #[error("asset read failed: {0}")]
    Read(#[source] io::Error),
}

/// A handler or middleware failure that escaped the dispatch.
///
/// The core never recovers from these; the boundary logs them and answers
/// with a 500.
#[derive(Debug, Error)]
#[error("dispatch of route '{route}' failed: {source}")]
pub struct DispatchError {
    /// Name of the matched route.
    pub route: String,
    /// What went wrong.
    #[source]
    pub source: CallError,
}

impl DispatchError {
    pub(crate) fn new(route: &str, source: CallError) -> Self {
        Self {
            route: route.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_message() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:80".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:80: denied");
    }

    #[test]
    fn test_dispatch_error_names_route() {
        let err = DispatchError::new("checkout", CallError::handler(anyhow::anyhow!("boom")));
        assert!(err.to_string().contains("checkout"));
        assert!(err.to_string().contains("boom"));
    }
}
