//! Middleware registration errors.

use thiserror::Error;

/// Result type alias using [`MiddlewareError`].
pub type MiddlewareResult<T> = Result<T, MiddlewareError>;

/// Why a middleware registration was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    /// The middleware was scoped to a route that does not exist.
    #[error("no route named {route:?}")]
    UnknownRoute {
        /// Requested route name, lowercased.
        route: String,
    },
}
