//! Scoped before/after middleware.
//!
//! Entries are registered for one phase and either one route or every route.
//! For a matched route, a phase runs its route-scoped entries first and the
//! global entries second, each group in registration order:
//!
//! ```text
//! before[route] → before[*] → handler → after[route] → after[*]
//! ```

use std::collections::HashMap;
use std::fmt;

use syme_core::{CallError, InjectionContext, RouteTable};

use crate::error::{MiddlewareError, MiddlewareResult};
use crate::middleware::BoxedMiddleware;

/// When a middleware runs relative to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the handler.
    Before,
    /// After the handler.
    After,
}

impl Phase {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which routes a middleware applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every route.
    All,
    /// The route with this (lowercased) name.
    Route(String),
}

impl From<Option<&str>> for Scope {
    fn from(route: Option<&str>) -> Self {
        route.map_or(Self::All, |name| Self::Route(name.trim().to_lowercase()))
    }
}

impl From<&str> for Scope {
    fn from(route: &str) -> Self {
        Self::from(Some(route))
    }
}

#[derive(Default)]
struct Layer {
    global: Vec<BoxedMiddleware>,
    scoped: HashMap<String, Vec<BoxedMiddleware>>,
}

impl Layer {
    fn ordered<'a>(&'a self, route: &str) -> impl Iterator<Item = &'a BoxedMiddleware> + 'a {
        self.scoped
            .get(&route.to_lowercase())
            .into_iter()
            .flatten()
            .chain(self.global.iter())
    }

    fn len(&self) -> usize {
        self.global.len() + self.scoped.values().map(Vec::len).sum::<usize>()
    }
}

/// Registered middleware for both phases.
#[derive(Default)]
pub struct Pipeline {
    before: Layer,
    after: Layer,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `middleware` for `phase` and `scope`.
    ///
    /// A route scope must name a route already stored in `table`.
    pub fn register(
        &mut self,
        phase: Phase,
        scope: Scope,
        middleware: BoxedMiddleware,
        table: &RouteTable,
    ) -> MiddlewareResult<()> {
        let layer = match phase {
            Phase::Before => &mut self.before,
            Phase::After => &mut self.after,
        };

        match scope {
            Scope::All => {
                tracing::debug!(phase = %phase, middleware = middleware.name(), "global middleware registered");
                layer.global.push(middleware);
            }
            Scope::Route(route) => {
                if !table.exists(&route) {
                    tracing::warn!(phase = %phase, route = %route, "middleware for unknown route rejected");
                    return Err(MiddlewareError::UnknownRoute { route });
                }
                tracing::debug!(phase = %phase, route = %route, middleware = middleware.name(), "route middleware registered");
                layer.scoped.entry(route).or_default().push(middleware);
            }
        }
        Ok(())
    }

    /// Middleware of `phase` applicable to `route`, in execution order.
    pub fn ordered<'a>(&'a self, phase: Phase, route: &str) -> impl Iterator<Item = &'a BoxedMiddleware> + 'a {
        match phase {
            Phase::Before => self.before.ordered(route),
            Phase::After => self.after.ordered(route),
        }
    }

    /// Runs every middleware of `phase` for `route`.
    ///
    /// Stops at the first failure and returns it.
    pub fn run(&self, phase: Phase, route: &str, cx: &InjectionContext<'_>) -> Result<(), CallError> {
        for middleware in self.ordered(phase, route) {
            tracing::debug!(phase = %phase, route = %route, middleware = middleware.name(), "running middleware");
            middleware.handle(cx)?;
        }
        Ok(())
    }

    /// Number of middleware registered for `phase`, all scopes included.
    pub fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Before => self.before.len(),
            Phase::After => self.after.len(),
        }
    }

    /// Returns true if no middleware is registered at all.
    pub fn is_empty(&self) -> bool {
        self.before.len() + self.after.len() == 0
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}
