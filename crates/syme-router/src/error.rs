//! Registration errors.

use thiserror::Error;

/// Result type alias for routing table operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// Reasons a rule is refused by [`RoutingTable::store`](crate::RoutingTable::store).
///
/// Conditions are checked in declaration order, so a rule that is both a
/// duplicate and has no valid methods reports [`RouteError::DuplicateName`].
/// A refused rule leaves the table untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A rule with the same (case-insensitive) name is already stored.
    #[error("route '{name}' is already registered")]
    DuplicateName {
        /// The normalized route name.
        name: String,
    },

    /// None of the requested methods belongs to GET, POST, PUT, PATCH or DELETE.
    #[error("route '{name}' has no valid HTTP method")]
    NoValidMethods {
        /// The normalized route name.
        name: String,
    },

    /// Another rule already claims this uri for one of the requested methods.
    #[error("uri '{uri}' is already linked to route '{existing}'")]
    UriCollision {
        /// The normalized uri.
        uri: String,
        /// Name of the rule that owns the uri.
        existing: String,
    },

    /// The callback can never be invoked.
    #[error("route '{name}' has a callback that is not invocable")]
    NotInvocable {
        /// The normalized route name.
        name: String,
    },

    /// A segment constraint produced an invalid regular expression.
    #[error("invalid pattern for uri '{uri}': {reason}")]
    InvalidPattern {
        /// The normalized uri.
        uri: String,
        /// Compiler message.
        reason: String,
    },
}

impl RouteError {
    /// Returns a short machine-readable tag for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateName { .. } => "duplicate_name",
            Self::NoValidMethods { .. } => "no_valid_methods",
            Self::UriCollision { .. } => "uri_collision",
            Self::NotInvocable { .. } => "not_invocable",
            Self::InvalidPattern { .. } => "invalid_pattern",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouteError::UriCollision {
            uri: "/users".to_string(),
            existing: "users".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "uri '/users' is already linked to route 'users'"
        );
        assert_eq!(err.kind(), "uri_collision");
    }
}
