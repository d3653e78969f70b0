//! Test client for in-memory dispatch.

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use serde::Serialize;
use syme_core::Request;
use syme_server::{transport, Application, Dispatcher};

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// Dispatches requests against an application without opening a socket.
///
/// Requests go through the same transport conversion, routing, middleware,
/// injection and negotiation as over the network; assets are streamed into
/// memory.
///
/// # Example
///
/// ```
/// use syme_config::SymeConfig;
/// use syme_core::Response;
/// use syme_server::Application;
/// use syme_test::TestClient;
///
/// # tokio_test::block_on(async {
/// let mut app = Application::new(SymeConfig::default());
/// app.get("home", "/", |r: Response| r.write("hello").clone()).unwrap();
///
/// let client = TestClient::from_app(app);
/// let response = client.get("/").send().await;
/// response.assert_status(200).assert_text("hello");
/// # });
/// ```
#[must_use]
#[derive(Clone)]
pub struct TestClient {
    dispatcher: Arc<Dispatcher>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Wraps a built dispatcher.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            default_headers: Vec::new(),
        }
    }

    /// Builds `app` and wraps the result.
    pub fn from_app(app: Application) -> Self {
        Self::new(app.build())
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The dispatcher under test.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::get(uri))
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::post(uri))
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::put(uri))
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::patch(uri))
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequest::delete(uri))
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Dispatches a built request.
    ///
    /// A failed dispatch becomes the bare 500 the server would send.
    pub async fn execute(&self, request: TestRequest) -> TestResponse {
        let (parts, body, remote_addr) = request.into_parts();
        let transport =
            transport::from_parts(parts, body, remote_addr, self.dispatcher.config()).await;
        let request = Request::from_transport(transport);

        match self.dispatcher.dispatch(&request) {
            Ok(outcome) => TestResponse::from_outcome(outcome),
            Err(e) => {
                tracing::error!(route = %e.route, error = %e, "dispatch failed");
                TestResponse::server_error()
            }
        }
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("routes", &self.dispatcher.routes().len())
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

/// A request builder bound to a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, builder: TestRequestBuilder) -> Self {
        let builder = client
            .default_headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));
        Self { client, builder }
    }

    fn map(mut self, f: impl FnOnce(TestRequestBuilder) -> TestRequestBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }

    /// Sets a header.
    pub fn header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.map(|b| b.header(name, value))
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.map(|b| b.content_type(content_type))
    }

    /// Sets the Accept-Encoding header.
    pub fn accept_encoding(self, encodings: impl AsRef<str>) -> Self {
        self.map(|b| b.accept_encoding(encodings))
    }

    /// Sets the If-None-Match header.
    pub fn if_none_match(self, etag: impl AsRef<str>) -> Self {
        self.map(|b| b.if_none_match(etag))
    }

    /// Sets the If-Modified-Since header.
    pub fn if_modified_since(self, date: impl AsRef<str>) -> Self {
        self.map(|b| b.if_modified_since(date))
    }

    /// Sets the Range header.
    pub fn range(self, start: u64, end: Option<u64>) -> Self {
        self.map(|b| b.range(start, end))
    }

    /// Sets the raw body.
    pub fn body(self, body: impl Into<Bytes>) -> Self {
        self.map(|b| b.body(body))
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.map(|b| b.json(value))
    }

    /// Sets a urlencoded form body.
    pub fn form<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.map(|b| b.form(value))
    }

    /// Attaches a file part.
    pub fn file(
        self,
        field: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        self.map(|b| b.file(field, filename, content_type, content))
    }

    /// Dispatches the request.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("invalid test request: {e}"),
        }
    }

    /// Dispatches the request, reporting build errors.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        Ok(self.client.execute(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use syme_config::{AssetsConfig, CompressionConfig, SymeConfig, SymeConfigBuilder};
    use syme_core::{Attributes, Component, Data, Redirect, Response};
    use tempfile::TempDir;

    fn client() -> TestClient {
        let mut app = Application::new(SymeConfig::default());
        app.get("home", "/", |r: Response| r.write("hello").clone())
            .unwrap();
        app.get("user", "/users/{id}", |r: Response, attrs: Attributes| {
            let id = attrs.get("id").and_then(|v| v.as_i64()).unwrap_or(-1);
            r.write(&format!("user {id}")).clone()
        })
        .unwrap();
        app.post("login", "/login", |request: Request, r: Response| {
            let user = request
                .form_value("user")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            r.write(&format!("welcome {user}")).clone()
        })
        .unwrap();
        app.get("old", "/old", || Redirect::to("/")).unwrap();
        TestClient::from_app(app)
    }

    #[tokio::test]
    async fn test_get_route() {
        let response = client().get("/").send().await;

        response
            .assert_status(200)
            .assert_text("hello")
            .assert_header("content-length", "5")
            .assert_header("etag", "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(response.outcome(), "send");
    }

    #[tokio::test]
    async fn test_captures_reach_handler() {
        let response = client().get("/users/42").send().await;
        response.assert_status(200).assert_text("user 42");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = client().get("/nowhere").send().await;
        response.assert_status(404);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn test_method_mismatch_is_404() {
        client().delete("/").send().await.assert_status(404);
    }

    #[tokio::test]
    async fn test_form_body() {
        let response = client()
            .post("/login")
            .form(&[("user", "ada")])
            .send()
            .await;
        response.assert_status(200).assert_text("welcome ada");
    }

    #[tokio::test]
    async fn test_redirect() {
        let response = client().get("/old").send().await;
        response.assert_status(302).assert_header("location", "/");
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_request_gets_304() {
        let client = client();
        let first = client.get("/").send().await;
        let etag = first.header("etag").unwrap().to_string();

        let second = client.get("/").if_none_match(format!("\"{etag}\"")).send().await;
        second.assert_status(304).assert_no_header("etag");
        assert_eq!(second.outcome(), "not_modified");
        assert!(second.body().is_empty());
    }

    #[tokio::test]
    async fn test_gzip_when_accepted() {
        let config = SymeConfigBuilder::new()
            .compression(CompressionConfig {
                enabled: true,
                min_size: 1,
                ..CompressionConfig::default()
            })
            .build();
        let mut app = Application::new(config);
        app.get("page", "/page", |r: Response| r.write("a page body").clone())
            .unwrap();
        let client = TestClient::from_app(app);

        let plain = client.get("/page").send().await;
        plain.assert_no_header("content-encoding").assert_text("a page body");

        let zipped = client.get("/page").accept_encoding("gzip, deflate").send().await;
        zipped.assert_header("content-encoding", "gzip");

        let mut decoded = String::new();
        GzDecoder::new(&zipped.body()[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "a page body");
    }

    #[tokio::test]
    async fn test_middleware_and_default_headers() {
        let mut app = Application::new(SymeConfig::default());
        app.get("echo", "/echo", |request: Request, r: Response, data: Data| {
            let tenant = request.header("x-tenant").unwrap_or("none").to_string();
            let seen = data.get::<bool>("seen").unwrap_or(false);
            r.write(&format!("{tenant} {seen}")).clone()
        })
        .unwrap();
        app.before(None, |data: Data| data.set("seen", true)).unwrap();
        app.after("echo", |r: Response| {
            r.with_header("X-After", "1");
        })
        .unwrap();

        let client = TestClient::from_app(app).with_default_header("X-Tenant", "acme");
        let response = client.get("/echo").send().await;
        response
            .assert_status(200)
            .assert_text("acme true")
            .assert_header("x-after", "1");
    }

    struct Missing;

    #[tokio::test]
    async fn test_injection_failure_is_500() {
        let mut app = Application::new(SymeConfig::default());
        app.get("broken", "/broken", |_: Component<Missing>| Response::new())
            .unwrap();

        let response = TestClient::from_app(app).get("/broken").send().await;
        response.assert_status(500);
        assert!(response.headers().is_empty());
    }

    #[tokio::test]
    async fn test_unbound_named_callback_is_501() {
        let mut app = Application::new(SymeConfig::default());
        app.get("named", "/named", "Nobody").unwrap();

        TestClient::from_app(app)
            .get("/named")
            .send()
            .await
            .assert_status(501);
    }

    #[tokio::test]
    async fn test_uploaded_files_reach_handler() {
        let mut app = Application::new(SymeConfig::default());
        app.post("upload", "/upload", |request: Request, r: Response| {
            let files = request.files();
            r.write(&format!("{} {}", files.count(), files.has_file("docs")))
                .clone()
        })
        .unwrap();

        let response = TestClient::from_app(app)
            .post("/upload")
            .file("docs[]", "a.txt", "text/plain", "aaa")
            .file("docs[]", "b.txt", "text/plain", "bb")
            .send()
            .await;
        response.assert_status(200).assert_text("2 true");
    }

    #[tokio::test]
    async fn test_assets_and_ranges() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "0123456789").unwrap();

        let config = SymeConfigBuilder::new()
            .assets(AssetsConfig {
                path: dir.path().to_path_buf(),
                ..AssetsConfig::default()
            })
            .build();
        let client = TestClient::from_app(Application::new(config));

        let whole = client.get("/notes.txt").send().await;
        whole
            .assert_status(200)
            .assert_text("0123456789")
            .assert_header("accept-ranges", "bytes")
            .assert_header("content-length", "10");
        assert_eq!(whole.outcome(), "asset");

        let part = client.get("/notes.txt").range(2, Some(4)).send().await;
        part.assert_status(206)
            .assert_text("234")
            .assert_header("content-range", "bytes 2-4/10");

        let bad = client.get("/notes.txt").range(20, None).send().await;
        bad.assert_status(200).assert_text("0123456789");
    }

    #[tokio::test]
    async fn test_try_send_reports_bad_header() {
        let err = client()
            .get("/")
            .header("bad header", "x")
            .try_send()
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(_)));
    }
}
