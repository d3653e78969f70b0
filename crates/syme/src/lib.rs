//! # Syme
//!
//! A small HTTP application core built around named routes:
//!
//! - **Routing** - `/users/{id:\d+}` style patterns compiled to anchored
//!   regexes, matched in registration order and reversible by route name
//! - **Injection** - handlers and middleware declare what they need
//!   ([`Request`](prelude::Request), [`Response`](prelude::Response),
//!   [`Data`](prelude::Data), captures, components) and receive it per call
//! - **Middleware** - before and after chains, global or bound to one route
//! - **Negotiation** - ETag and Last-Modified revalidation, gzip, cache headers
//! - **Assets** - files under the assets root are streamed in chunks, with
//!   single byte-range support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use syme::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load()?;
//!     syme::telemetry::init_logging(&config.logging)?;
//!
//!     let mut app = Application::new(config);
//!     app.get("user", "/users/{id:\\d+}", |r: Response, attrs: Attributes| {
//!         let id = attrs.get("id").and_then(Value::as_i64).unwrap_or_default();
//!         r.write(&format!("user {id}")).clone()
//!     })?;
//!
//!     Server::from_config(app.build()).await?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! asset? ──yes──> stream file (200/206)
//!   │no
//! route? ──no───> 404
//!   │
//! before chain ─> handler ─> after chain ─> negotiate (200/304)
//! ```

#![doc(html_root_url = "https://docs.rs/syme/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use syme_config as config;
pub use syme_core as core;
pub use syme_middleware as middleware;
pub use syme_router as router;
pub use syme_server as server;
pub use syme_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use syme::prelude::*;
///
/// let mut app = Application::new(SymeConfig::default());
/// app.get("home", "/", |r: Response| r.write("hi").clone()).unwrap();
/// assert!(app.routes().exists("home"));
/// ```
pub mod prelude {
    pub use syme_config::{ConfigLoader, SymeConfig, SymeConfigBuilder};

    pub use syme_core::{
        Attributes, Component, Data, Extension, FromInjection, InjectionContext, Invokable,
        IntoReply, Path, Redirect, Reply, Request, Response, Routes, UploadEntry, UploadedFile,
        UploadedFiles, Value,
    };

    pub use syme_middleware::{MiddlewareError, Phase, Scope};

    pub use syme_router::{MethodSet, RouteError};

    pub use syme_server::{Application, Dispatcher, Outcome, Server, ShutdownSignal};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use syme_test::TestClient;

    #[test]
    fn test_prelude_builds_an_application() {
        let mut app = Application::new(SymeConfig::default());
        app.get("hello", "/hello/{name}", |r: Response, attrs: Attributes| {
            let name = attrs
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("nobody")
                .to_string();
            r.write(&format!("hello {name}")).clone()
        })
        .unwrap();

        let client = TestClient::from_app(app);
        let response = tokio_test::block_on(client.get("/hello/ada").send());
        response.assert_status(200).assert_text("hello ada");
    }
}
