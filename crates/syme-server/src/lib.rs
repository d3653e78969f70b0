//! # Syme Server
//!
//! The request-serving half of Syme:
//!
//! - [`Application`] - bootstrap registration of routes, middleware and components
//! - [`Dispatcher`] - the per-request state machine producing an [`Outcome`]
//! - [`assets`] - static files with byte-range support
//! - [`negotiate`] - ETag, 304 short-circuit, gzip and cache headers
//! - [`Server`] - the tokio/hyper HTTP/1 boundary
//!
//! ## Example
//!
//! ```rust,no_run
//! use syme_config::ConfigLoader;
//! use syme_core::{Attributes, Response};
//! use syme_server::{Application, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_optional_file("syme.toml")?.with_default_env().load()?;
//!     syme_telemetry::init_logging(&config.logging)?;
//!
//!     let mut app = Application::new(config);
//!     app.get("user", "/users/{id:\\d+}", |attrs: Attributes, response: Response| {
//!         let id = attrs.get("id").map(ToString::to_string).unwrap_or_default();
//!         response.write(&format!("user {id}")).clone()
//!     })?;
//!
//!     Server::from_config(app.build()).await?.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/syme-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
pub mod assets;
mod dispatch;
mod error;
pub mod negotiate;
mod server;
mod shutdown;
pub mod transport;

pub use app::{Application, IntoCallback};
pub use assets::{AssetDelivery, AssetSink, Assets};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{AssetError, DispatchError, ServerError};
pub use negotiate::{Negotiated, Negotiator};
pub use server::{render, HttpResponse, ResponseBody, Server};
pub use shutdown::{InFlight, InFlightGuard, ShutdownSignal};
