//! Named, pattern-based routing table for Syme.
//!
//! This crate turns uri templates into anchored, case-insensitive regular
//! expressions and keeps them in an ordered table of named rules.
//!
//! # Features
//!
//! - **Named captures**: `/users/{id}` and constrained `/posts/{year:\d{4}}`
//! - **Method sets**: each rule answers to a subset of GET, POST, PUT, PATCH, DELETE
//! - **First match wins**: rules are scanned in registration order, no priority
//! - **Collision checks**: a uri can be claimed once per method
//! - **Reverse routing**: rebuild a concrete uri from a rule name and values
//!
//! # Example
//!
//! ```rust
//! use syme_router::{Invocable, MethodSet, RoutingTable};
//! use http::Method;
//!
//! #[derive(Debug)]
//! struct Op(&'static str);
//!
//! impl Invocable for Op {
//!     fn is_invocable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let mut table = RoutingTable::new();
//! table.store("list", MethodSet::filter(["GET"]), "/users", Op("listUsers")).unwrap();
//! table.store("show", MethodSet::filter(["GET"]), "/users/{id:\\d+}", Op("getUser")).unwrap();
//!
//! let found = table.find(&Method::GET, "/users/123").unwrap();
//! assert_eq!(found.rule.callback().0, "getUser");
//! assert_eq!(found.captures.get("id"), Some("123"));
//!
//! // A second rule may not claim the same uri for the same method.
//! assert!(table.store("again", MethodSet::ANY, "/users", Op("x")).is_err());
//! ```

#![doc(html_root_url = "https://docs.rs/syme-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method;
mod params;
mod pattern;
mod table;

pub use error::{RouteError, RouteResult};
pub use method::MethodSet;
pub use params::Captures;
pub use pattern::{normalize_uri, Pattern, Segment, DEFAULT_SEGMENT_REGEX};
pub use table::{Invocable, RouteMatch, RouteRule, RoutingTable};
