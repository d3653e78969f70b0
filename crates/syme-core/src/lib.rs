//! # Syme Core
//!
//! Per-request value objects and the injection machinery shared by every
//! other Syme crate.
//!
//! - [`Request`] - Immutable snapshot of an inbound transaction
//! - [`Response`] - Mutable response accumulator
//! - [`Data`] - Per-dispatch scratch space shared by middleware and handler
//! - [`ComponentRegistry`] - Lazily built, process-wide components
//! - [`FromInjection`] - Resolution of callback parameters
//! - [`Handler`] / [`Invokable`] - The two kinds of callback
//! - [`Routes`] - Reverse routing relative to the current request
//! - [`Value`] - Coercion of captured and submitted text

#![doc(html_root_url = "https://docs.rs/syme-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod data;
mod error;
pub mod fixtures;
mod handler;
mod inject;
mod registry;
mod reply;
mod request;
mod response;
mod routes;
mod upload;
mod value;

pub use data::Data;
pub use error::{CallError, InjectionError, InjectionResult};
pub use handler::{
    boxed, invokable, BoxedHandler, Callback, ErasedHandler, Handler, Invokable, RouteTable,
};
pub use inject::{Component, Extension, FromInjection, InjectionContext, Path};
pub use registry::ComponentRegistry;
pub use reply::{IntoReply, Redirect, Reply, DEFAULT_REDIRECT_STATUS};
pub use request::{Request, Transport, DEFAULT_REQUEST_CONTENT_TYPE};
pub use response::{is_valid_status, Response, ResponseParts, DEFAULT_CONTENT_TYPE};
pub use routes::Routes;
pub use upload::{UploadEntry, UploadError, UploadedFile, UploadedFiles};
pub use value::{escape_html, Attributes, Value};
