//! # Syme Test
//!
//! In-memory dispatch for Syme applications. A [`TestClient`] runs requests
//! through the full dispatch path (transport conversion, routing,
//! middleware, injection, negotiation and asset streaming) without binding
//! a port.
//!
//! ## Example
//!
//! ```
//! use syme_config::SymeConfig;
//! use syme_core::{Attributes, Response};
//! use syme_server::Application;
//! use syme_test::TestClient;
//!
//! # tokio_test::block_on(async {
//! let mut app = Application::new(SymeConfig::default());
//! app.get("user", "/users/{id}", |r: Response, attrs: Attributes| {
//!     let id = attrs.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
//!     r.write(&format!("user {id}")).clone()
//! })
//! .unwrap();
//!
//! let client = TestClient::from_app(app);
//! let response = client.get("/users/7").send().await;
//! response.assert_status(200).assert_text("user 7");
//!
//! client.get("/missing").send().await.assert_status(404);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/syme-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder, MULTIPART_BOUNDARY};
pub use response::TestResponse;
