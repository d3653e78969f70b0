//! # Syme Middleware
//!
//! Before/after middleware for Syme routes.
//!
//! A middleware is either a function with injected arguments or a named
//! [`Invokable`](syme_core::Invokable) type wrapped in [`Named`]. Both are
//! registered for a [`Phase`] and a [`Scope`] and run in a fixed order:
//!
//! ```text
//! before[route] → before[*] → handler → after[route] → after[*]
//! ```
//!
//! Middleware has no return-value contract beyond success or failure; it
//! communicates through the shared response and data bag.
//!
//! ## Example
//!
//! ```
//! use syme_core::fixtures::Fixture;
//! use syme_core::{Callback, Data, RouteTable};
//! use syme_middleware::{IntoMiddleware, Phase, Pipeline, Scope};
//! use syme_router::MethodSet;
//!
//! let mut table = RouteTable::new();
//! table.store("home", MethodSet::ANY, "/", Callback::named("Home")).unwrap();
//!
//! let mut pipeline = Pipeline::new();
//! let mark = (|data: Data| data.set("visited", true)).into_middleware();
//! pipeline.register(Phase::Before, Scope::All, mark, &table).unwrap();
//!
//! let fixture = Fixture::new("/");
//! pipeline.run(Phase::Before, "home", &fixture.context()).unwrap();
//! assert_eq!(fixture.data.get::<bool>("visited"), Some(true));
//! ```

#![doc(html_root_url = "https://docs.rs/syme-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod middleware;
pub mod pipeline;

pub use error::{MiddlewareError, MiddlewareResult};
pub use middleware::{
    BoxedMiddleware, FnMiddleware, IntoMiddleware, Middleware, MiddlewareOutput, Named,
};
pub use pipeline::{Phase, Pipeline, Scope};
