//! The dispatcher state machine.
//!
//! Every request walks the same states, in order:
//!
//! ```text
//! AssetCheck → RouteMatch → BeforeMiddleware → Handler → AfterMiddleware → Negotiate
//! ```
//!
//! Each terminal condition is returned as an [`Outcome`]; the caller performs
//! the actual I/O. The per-dispatch [`Response`] and [`Data`] bag are created
//! here and never outlive one call.

use std::collections::HashMap;
use std::sync::Arc;

use syme_config::SymeConfig;
use syme_core::{
    Attributes, BoxedHandler, Callback, ComponentRegistry, Data, InjectionContext, Reply, Request,
    Response, RouteTable, Routes,
};
use syme_middleware::{Phase, Pipeline};

use crate::assets::{AssetDelivery, Assets};
use crate::error::DispatchError;
use crate::negotiate::{Negotiated, Negotiator};

/// How a dispatch ended.
#[derive(Debug)]
pub enum Outcome {
    /// A negotiated response ready to send.
    Send(Negotiated),
    /// The client's cached copy is still valid.
    NotModified(Negotiated),
    /// A static file to stream.
    Asset(AssetDelivery),
    /// The handler asked for a redirect.
    Redirect {
        /// Target url.
        location: String,
        /// 3xx status.
        status: u16,
    },
    /// No route matched.
    NotFound,
    /// A route matched but its callback cannot be invoked.
    NotImplemented,
    /// The handler produced no response.
    BadRequest,
    /// The asset could not be opened.
    ServerError,
}

impl Outcome {
    /// Status code sent for this outcome.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Send(negotiated) | Self::NotModified(negotiated) => negotiated.status,
            Self::Asset(delivery) => delivery.status(),
            Self::Redirect { status, .. } => *status,
            Self::NotFound => 404,
            Self::NotImplemented => 501,
            Self::BadRequest => 400,
            Self::ServerError => 500,
        }
    }

    /// Headers sent for this outcome, in emission order.
    ///
    /// Bare status outcomes carry none.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            Self::Send(negotiated) | Self::NotModified(negotiated) => negotiated.headers.clone(),
            Self::Asset(delivery) => delivery.headers().to_vec(),
            Self::Redirect { location, .. } => vec![("Location".to_string(), location.clone())],
            Self::NotFound | Self::NotImplemented | Self::BadRequest | Self::ServerError => {
                Vec::new()
            }
        }
    }

    /// Short name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Send(_) => "send",
            Self::NotModified(_) => "not_modified",
            Self::Asset(_) => "asset",
            Self::Redirect { .. } => "redirect",
            Self::NotFound => "not_found",
            Self::NotImplemented => "not_implemented",
            Self::BadRequest => "bad_request",
            Self::ServerError => "server_error",
        }
    }
}

/// Immutable, shareable request dispatcher.
///
/// Built by [`Application::build`](crate::Application::build); registration
/// is no longer possible once a dispatcher exists.
pub struct Dispatcher {
    config: SymeConfig,
    table: Arc<RouteTable>,
    invokables: HashMap<String, BoxedHandler>,
    pipeline: Pipeline,
    registry: ComponentRegistry,
    assets: Assets,
    negotiator: Negotiator,
}

impl Dispatcher {
    pub(crate) fn new(
        config: SymeConfig,
        table: RouteTable,
        invokables: HashMap<String, BoxedHandler>,
        pipeline: Pipeline,
        registry: ComponentRegistry,
    ) -> Self {
        Self {
            assets: Assets::new(&config.assets),
            negotiator: Negotiator::new(&config),
            config,
            table: Arc::new(table),
            invokables,
            pipeline,
            registry,
        }
    }

    /// The configuration the dispatcher was built with.
    pub fn config(&self) -> &SymeConfig {
        &self.config
    }

    /// The routing table.
    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    /// The static asset directory.
    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    /// Runs one request through every state.
    ///
    /// Handler and middleware failures are returned as errors; the core
    /// does not recover from them.
    pub fn dispatch(&self, request: &Request) -> Result<Outcome, DispatchError> {
        let result = self.run(request);
        match &result {
            Ok(outcome) => tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                outcome = outcome.kind(),
                status = outcome.status(),
                "request dispatched"
            ),
            Err(e) => tracing::error!(
                method = %request.method(),
                uri = %request.uri(),
                route = %e.route,
                error = %e.source,
                "dispatch failed"
            ),
        }
        result
    }

    fn run(&self, request: &Request) -> Result<Outcome, DispatchError> {
        tracing::debug!(state = "asset_check", uri = %request.uri());
        if let Some(path) = self.assets.resolve(request.uri()) {
            return Ok(match self.assets.prepare(&path, request.header("range")) {
                Ok(delivery) => Outcome::Asset(delivery),
                Err(e) => {
                    tracing::error!(error = %e, "asset unavailable");
                    Outcome::ServerError
                }
            });
        }

        tracing::debug!(state = "route_match", method = %request.method(), uri = %request.uri());
        let Some(found) = self.table.find(request.method(), request.uri()) else {
            return Ok(Outcome::NotFound);
        };
        let route = found.rule.name();

        let handler = match found.rule.callback() {
            Callback::Handler(handler) => Arc::clone(handler),
            Callback::Named(name) => match self.invokables.get(&normalize(name)) {
                Some(handler) => Arc::clone(handler),
                None => {
                    tracing::warn!(route = %route, invokable = %name, "callback is not registered");
                    return Ok(Outcome::NotImplemented);
                }
            },
        };

        let attributes = Attributes::from_captures(found.captures.iter());
        let response = Response::new();
        let data = Data::new();
        let routes = Routes::new(Arc::clone(&self.table), request.clone());
        let cx = InjectionContext {
            request,
            response: &response,
            data: &data,
            attributes: &attributes,
            captures: &found.captures,
            routes: &routes,
            registry: &self.registry,
        };

        tracing::debug!(state = "before_middleware", route = %route);
        self.pipeline
            .run(Phase::Before, route, &cx)
            .map_err(|e| DispatchError::new(route, e))?;

        tracing::debug!(state = "handler", route = %route);
        let returned = match handler.call(&cx).map_err(|e| DispatchError::new(route, e))? {
            Reply::Response(returned) => returned,
            Reply::Redirect(redirect) => {
                return Ok(Outcome::Redirect {
                    location: redirect.location().to_string(),
                    status: redirect.status(),
                })
            }
            Reply::Nothing => return Ok(Outcome::BadRequest),
        };

        tracing::debug!(state = "after_middleware", route = %route);
        let cx = InjectionContext {
            response: &returned,
            ..cx
        };
        self.pipeline
            .run(Phase::After, route, &cx)
            .map_err(|e| DispatchError::new(route, e))?;

        tracing::debug!(state = "negotiate", route = %route);
        let negotiated = self.negotiator.negotiate(request, &returned.parts());
        Ok(if negotiated.is_not_modified() {
            Outcome::NotModified(negotiated)
        } else {
            Outcome::Send(negotiated)
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.len())
            .field("invokables", &self.invokables.len())
            .field("pipeline", &self.pipeline)
            .field("assets", &self.assets.root())
            .finish_non_exhaustive()
    }
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
