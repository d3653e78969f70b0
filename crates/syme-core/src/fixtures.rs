//! Ready-made dispatch state for tests.
//!
//! A [`Fixture`] owns everything an [`InjectionContext`] borrows, so handlers
//! and middleware can be exercised without a dispatcher.
//!
//! # Example
//!
//! ```
//! use syme_core::fixtures::Fixture;
//! use syme_core::{boxed, Response};
//!
//! let fixture = Fixture::new("/users/7").with_captures([("id", "7")]);
//! let handler = boxed(|response: Response| response.write("ok").clone());
//!
//! handler.call(&fixture.context()).unwrap();
//! assert_eq!(fixture.response.content(), "ok");
//! ```

use std::sync::Arc;

use syme_router::Captures;

use crate::data::Data;
use crate::handler::RouteTable;
use crate::inject::InjectionContext;
use crate::registry::ComponentRegistry;
use crate::request::Request;
use crate::response::Response;
use crate::routes::Routes;
use crate::value::Attributes;

/// Owned per-dispatch state.
#[derive(Debug)]
pub struct Fixture {
    /// Request being served.
    pub request: Request,
    /// Response under construction.
    pub response: Response,
    /// Data bag.
    pub data: Data,
    /// Raw captures.
    pub captures: Captures,
    /// Coerced captures.
    pub attributes: Attributes,
    /// Reverse-routing facade.
    pub routes: Routes,
    /// Component registry.
    pub registry: ComponentRegistry,
}

impl Fixture {
    /// State for a GET of `target`, with an empty route table and registry.
    ///
    /// # Panics
    ///
    /// Panics if `target` is not a valid request target.
    pub fn new(target: &str) -> Self {
        let request = Request::get(target).unwrap_or_else(|| panic!("invalid target {target}"));
        let routes = Routes::new(Arc::new(RouteTable::new()), request.clone());
        Self {
            request,
            response: Response::new(),
            data: Data::new(),
            captures: Captures::new(),
            attributes: Attributes::new(),
            routes,
            registry: ComponentRegistry::new(),
        }
    }

    /// Replaces the route captures.
    #[must_use]
    pub fn with_captures<'a>(mut self, captures: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.captures = captures.into_iter().collect();
        self.attributes = Attributes::from_captures(self.captures.iter());
        self
    }

    /// Replaces the component registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the route table.
    #[must_use]
    pub fn with_table(mut self, table: Arc<RouteTable>) -> Self {
        self.routes = Routes::new(table, self.request.clone());
        self
    }

    /// Borrows the state as an injection context.
    pub fn context(&self) -> InjectionContext<'_> {
        InjectionContext {
            request: &self.request,
            response: &self.response,
            data: &self.data,
            attributes: &self.attributes,
            captures: &self.captures,
            routes: &self.routes,
            registry: &self.registry,
        }
    }
}
