//! Error types for component injection and callback invocation.

use thiserror::Error;

/// Result type alias using [`InjectionError`].
pub type InjectionResult<T> = Result<T, InjectionError>;

/// A parameter of a handler, middleware or component could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    /// The requested component type was never registered.
    #[error("component {type_name} is not registered")]
    UnregisteredComponent {
        /// Fully qualified type name.
        type_name: &'static str,
    },

    /// A typed parameter could not be built from the dispatch state.
    #[error("cannot resolve parameter {type_name}: {reason}")]
    UnresolvedParameter {
        /// Fully qualified type name.
        type_name: &'static str,
        /// Why resolution failed.
        reason: String,
    },

    /// A component constructor returned an error.
    #[error("failed to construct {type_name}: {reason}")]
    ConstructionFailed {
        /// Fully qualified type name.
        type_name: &'static str,
        /// Constructor error message.
        reason: String,
    },

    /// A component depends on itself, directly or transitively.
    #[error("dependency cycle while constructing {type_name}")]
    DependencyCycle {
        /// Type whose construction re-entered itself.
        type_name: &'static str,
    },
}

impl InjectionError {
    /// Component `T` was never registered.
    #[must_use]
    pub fn not_registered<T>() -> Self {
        Self::UnregisteredComponent {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Parameter `T` could not be resolved.
    #[must_use]
    pub fn unresolved<T>(reason: impl Into<String>) -> Self {
        Self::UnresolvedParameter {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Constructor of `T` failed.
    #[must_use]
    pub fn construction_failed<T>(reason: impl Into<String>) -> Self {
        Self::ConstructionFailed {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }

    /// Construction of `T` re-entered itself.
    #[must_use]
    pub fn cycle<T>() -> Self {
        Self::DependencyCycle {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the type that failed.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::UnregisteredComponent { type_name }
            | Self::UnresolvedParameter { type_name, .. }
            | Self::ConstructionFailed { type_name, .. }
            | Self::DependencyCycle { type_name } => type_name,
        }
    }
}

/// Failure while running a handler or middleware.
#[derive(Debug, Error)]
pub enum CallError {
    /// Arguments could not be injected; the callback never ran.
    #[error(transparent)]
    Injection(#[from] InjectionError),

    /// The callback ran and returned an error.
    #[error("callback failed: {0}")]
    Handler(anyhow::Error),
}

impl CallError {
    /// Wraps a callback error.
    pub fn handler(error: impl Into<anyhow::Error>) -> Self {
        Self::Handler(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer;

    #[test]
    fn test_not_registered_names_type() {
        let err = InjectionError::not_registered::<Mailer>();
        assert!(err.type_name().ends_with("Mailer"));
        assert!(err.to_string().contains("is not registered"));
    }

    #[test]
    fn test_construction_failed_message() {
        let err = InjectionError::construction_failed::<Mailer>("smtp down");
        assert!(err.to_string().ends_with("smtp down"));
    }

    #[test]
    fn test_call_error_from_injection() {
        let err: CallError = InjectionError::cycle::<Mailer>().into();
        assert!(matches!(err, CallError::Injection(InjectionError::DependencyCycle { .. })));
        assert!(err.to_string().contains("dependency cycle"));
    }

    #[test]
    fn test_call_error_handler() {
        let err = CallError::handler(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "callback failed: boom");
    }
}
