//! Application bootstrap.
//!
//! [`Application`] collects routes, named invokables, middleware and
//! components, then freezes them into a [`Dispatcher`]. Nothing can be
//! registered once the dispatcher has been built.
//!
//! # Example
//!
//! ```rust
//! use syme_config::SymeConfig;
//! use syme_core::{Data, Response};
//! use syme_server::Application;
//!
//! let mut app = Application::new(SymeConfig::default());
//! app.get("home", "/", |response: Response| response.write("hello").clone())
//!     .unwrap();
//! app.before(None, |data: Data| data.set("seen", true)).unwrap();
//!
//! let dispatcher = app.build();
//! assert!(dispatcher.routes().exists("home"));
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use http::Method;
use syme_config::SymeConfig;
use syme_core::{
    invokable, BoxedHandler, Callback, ComponentRegistry, Extension, Handler, IntoReply,
    Invokable, RouteTable,
};
use syme_middleware::{IntoMiddleware, MiddlewareResult, Phase, Pipeline, Scope};
use syme_router::{MethodSet, RouteResult};

use crate::dispatch::{normalize, Dispatcher};

/// Conversion into a route [`Callback`].
///
/// Implemented for [`Callback`] itself, for handler functions and for `&str`,
/// which names an invokable registered with [`Application::invokable`].
pub trait IntoCallback<Marker> {
    /// Performs the conversion.
    fn into_callback(self) -> Callback;
}

#[doc(hidden)]
pub struct Direct;

#[doc(hidden)]
pub struct ByName;

#[doc(hidden)]
pub struct Function<Args>(PhantomData<fn() -> Args>);

impl IntoCallback<Direct> for Callback {
    fn into_callback(self) -> Callback {
        self
    }
}

impl IntoCallback<ByName> for &str {
    fn into_callback(self) -> Callback {
        Callback::named(self)
    }
}

impl<H, Args> IntoCallback<Function<Args>> for H
where
    H: Handler<Args>,
    H::Output: IntoReply,
    Args: 'static,
{
    fn into_callback(self) -> Callback {
        Callback::handler(self)
    }
}

/// Registration surface of a Syme application.
pub struct Application {
    config: SymeConfig,
    table: RouteTable,
    invokables: HashMap<String, BoxedHandler>,
    pipeline: Pipeline,
    registry: ComponentRegistry,
}

impl Application {
    /// Creates an application with nothing registered.
    pub fn new(config: SymeConfig) -> Self {
        Self {
            config,
            table: RouteTable::new(),
            invokables: HashMap::new(),
            pipeline: Pipeline::new(),
            registry: ComponentRegistry::new(),
        }
    }

    /// The application configuration.
    pub fn config(&self) -> &SymeConfig {
        &self.config
    }

    /// Routes registered so far.
    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// Registers `callback` for every supported method.
    pub fn any<C, M>(&mut self, name: &str, uri: &str, callback: C) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.map(MethodSet::ANY, name, uri, callback)
    }

    /// Registers `callback` for an explicit method set.
    pub fn map<C, M>(
        &mut self,
        methods: MethodSet,
        name: &str,
        uri: &str,
        callback: C,
    ) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.table
            .store(name, methods, uri, callback.into_callback())?;
        Ok(self)
    }

    /// Registers a GET route.
    pub fn get<C, M>(&mut self, name: &str, uri: &str, callback: C) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.map(MethodSet::single(&Method::GET), name, uri, callback)
    }

    /// Registers a POST route.
    pub fn post<C, M>(&mut self, name: &str, uri: &str, callback: C) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.map(MethodSet::single(&Method::POST), name, uri, callback)
    }

    /// Registers a PUT route.
    pub fn put<C, M>(&mut self, name: &str, uri: &str, callback: C) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.map(MethodSet::single(&Method::PUT), name, uri, callback)
    }

    /// Registers a PATCH route.
    pub fn patch<C, M>(&mut self, name: &str, uri: &str, callback: C) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.map(MethodSet::single(&Method::PATCH), name, uri, callback)
    }

    /// Registers a DELETE route.
    pub fn delete<C, M>(&mut self, name: &str, uri: &str, callback: C) -> RouteResult<&mut Self>
    where
        C: IntoCallback<M>,
    {
        self.map(MethodSet::single(&Method::DELETE), name, uri, callback)
    }

    /// Makes `T` callable by `name` from routes and middleware.
    ///
    /// Names are case-insensitive. A later registration under the same name
    /// replaces the earlier one.
    pub fn invokable<T>(&mut self, name: &str) -> &mut Self
    where
        T: Invokable,
        T::Output: IntoReply,
    {
        if self
            .invokables
            .insert(normalize(name), invokable::<T>())
            .is_some()
        {
            tracing::warn!(invokable = %name, "invokable replaced");
        }
        self
    }

    /// Runs `middleware` before the handler of `route`, or of every route.
    pub fn before<'a, M>(
        &mut self,
        route: impl Into<Option<&'a str>>,
        middleware: impl IntoMiddleware<M>,
    ) -> MiddlewareResult<&mut Self> {
        self.register(Phase::Before, route.into(), middleware)
    }

    /// Runs `middleware` after the handler of `route`, or of every route.
    pub fn after<'a, M>(
        &mut self,
        route: impl Into<Option<&'a str>>,
        middleware: impl IntoMiddleware<M>,
    ) -> MiddlewareResult<&mut Self> {
        self.register(Phase::After, route.into(), middleware)
    }

    fn register<M>(
        &mut self,
        phase: Phase,
        route: Option<&str>,
        middleware: impl IntoMiddleware<M>,
    ) -> MiddlewareResult<&mut Self> {
        self.pipeline.register(
            phase,
            Scope::from(route),
            middleware.into_middleware(),
            &self.table,
        )?;
        Ok(self)
    }

    /// Registers `T` as a lazily built component.
    pub fn extend_with<T: Extension>(&mut self) -> &mut Self {
        if !self.registry.extend_with::<T>() {
            tracing::debug!(component = std::any::type_name::<T>(), "component already registered");
        }
        self
    }

    /// Registers an already built component.
    pub fn provide<T: Send + Sync + 'static>(&mut self, instance: T) -> &mut Self {
        if !self.registry.provide(instance) {
            tracing::debug!(component = std::any::type_name::<T>(), "component already registered");
        }
        self
    }

    /// Freezes the registrations into a dispatcher.
    pub fn build(self) -> Dispatcher {
        tracing::info!(
            routes = self.table.len(),
            invokables = self.invokables.len(),
            "application built"
        );
        Dispatcher::new(
            self.config,
            self.table,
            self.invokables,
            self.pipeline,
            self.registry,
        )
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("routes", &self.table.len())
            .field("invokables", &self.invokables.len())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
