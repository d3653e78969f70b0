//! Test request building.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;

use crate::error::TestError;

/// Boundary used for multipart bodies assembled by [`TestRequestBuilder::file`].
pub const MULTIPART_BOUNDARY: &str = "syme-test-boundary";

/// A request ready to be dispatched by a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request target
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
    /// Simulated peer address
    pub remote_addr: Option<SocketAddr>,
}

impl TestRequest {
    /// Starts a GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Splits the request into the pieces the transport layer consumes.
    pub(crate) fn into_parts(self) -> (http::request::Parts, Bytes, Option<SocketAddr>) {
        let mut request = http::Request::new(());
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        let (parts, ()) = request.into_parts();
        (parts, self.body, self.remote_addr)
    }
}

struct FilePart {
    field: String,
    filename: String,
    content_type: String,
    content: Bytes,
}

/// Builder for [`TestRequest`].
///
/// Invalid input does not panic here; the first problem is kept and
/// reported by [`build`](Self::build).
#[must_use]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    files: Vec<FilePart>,
    remote_addr: Option<SocketAddr>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a builder for `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: None,
            files: Vec::new(),
            remote_addr: None,
            error: None,
        }
    }

    /// Sets a header, replacing any earlier value.
    ///
    /// # Example
    ///
    /// ```
    /// use syme_test::TestRequest;
    ///
    /// let request = TestRequest::get("/users")
    ///     .header("Accept-Language", "fr")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers["accept-language"], "fr");
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(TestError::InvalidHeader(name.to_string())),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Accept-Encoding header.
    pub fn accept_encoding(self, encodings: impl AsRef<str>) -> Self {
        self.header(header::ACCEPT_ENCODING.as_str(), encodings)
    }

    /// Sets the If-None-Match header.
    pub fn if_none_match(self, etag: impl AsRef<str>) -> Self {
        self.header(header::IF_NONE_MATCH.as_str(), etag)
    }

    /// Sets the If-Modified-Since header.
    pub fn if_modified_since(self, date: impl AsRef<str>) -> Self {
        self.header(header::IF_MODIFIED_SINCE.as_str(), date)
    }

    /// Asks for `bytes=start-end`; `None` leaves the range open.
    pub fn range(self, start: u64, end: Option<u64>) -> Self {
        let end = end.map(|end| end.to_string()).unwrap_or_default();
        self.header(header::RANGE.as_str(), format!("bytes={start}-{end}"))
    }

    /// Sets the simulated peer address.
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a JSON body and its Content-Type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.content_type("application/json")
            }
            Err(e) => {
                self.fail(TestError::Json(e));
                self
            }
        }
    }

    /// Sets a urlencoded form body and its Content-Type.
    ///
    /// ```
    /// use syme_test::TestRequest;
    ///
    /// let request = TestRequest::post("/login")
    ///     .form(&[("user", "ada"), ("remember", "1")])
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.body, "user=ada&remember=1");
    /// ```
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => {
                self.body = Some(Bytes::from(encoded));
                self.content_type("application/x-www-form-urlencoded")
            }
            Err(e) => {
                self.fail(TestError::Encode(e.to_string()));
                self
            }
        }
    }

    /// Attaches a file part; the body becomes `multipart/form-data`.
    ///
    /// Use a `name[]` field to send several files under one name.
    pub fn file(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        self.files.push(FilePart {
            field: field.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            content: content.into(),
        });
        self
    }

    /// Builds the request, reporting the first invalid input.
    pub fn build(mut self) -> Result<TestRequest, TestError> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        let uri = self
            .uri
            .parse::<Uri>()
            .map_err(|source| TestError::InvalidUri {
                uri: self.uri.clone(),
                source,
            })?;

        let body = if self.files.is_empty() {
            self.body.unwrap_or_default()
        } else {
            let value = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::try_from(value)
                    .map_err(|_| TestError::InvalidHeader("content-type".into()))?,
            );
            encode_multipart(&self.files)
        };

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            body,
            remote_addr: self.remote_addr,
        })
    }

    fn fail(&mut self, error: TestError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

fn encode_multipart(files: &[FilePart]) -> Bytes {
    let mut body = Vec::new();
    for part in files {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(&part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    Bytes::from(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_get() {
        let request = TestRequest::get("/users/7?full=1").build().unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.uri.path(), "/users/7");
        assert_eq!(request.uri.query(), Some("full=1"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_json_sets_content_type() {
        let request = TestRequest::post("/users")
            .json(&json!({"name": "Alice"}))
            .build()
            .unwrap();

        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
        let parsed: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(parsed["name"], "Alice");
    }

    #[test]
    fn test_range_header() {
        let closed = TestRequest::get("/a.bin").range(10, Some(20)).build().unwrap();
        assert_eq!(closed.headers[header::RANGE], "bytes=10-20");

        let open = TestRequest::get("/a.bin").range(5, None).build().unwrap();
        assert_eq!(open.headers[header::RANGE], "bytes=5-");
    }

    #[test]
    fn test_invalid_header_reported_at_build() {
        let err = TestRequest::get("/")
            .header("bad header", "x")
            .header("also bad", "y")
            .build()
            .unwrap_err();
        assert!(matches!(err, TestError::InvalidHeader(ref name) if name == "bad header"));
    }

    #[test]
    fn test_invalid_uri() {
        let err = TestRequest::get("http://[::1").build().unwrap_err();
        assert!(matches!(err, TestError::InvalidUri { .. }));
    }

    #[test]
    fn test_files_become_multipart() {
        let request = TestRequest::post("/upload")
            .file("avatar", "me.png", "image/png", &b"PNG"[..])
            .build()
            .unwrap();

        let content_type = request.headers[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        assert!(content_type.ends_with(MULTIPART_BOUNDARY));

        let body = String::from_utf8(request.body.to_vec()).unwrap();
        assert!(body.contains("filename=\"me.png\""));
        assert!(body.ends_with(&format!("--{MULTIPART_BOUNDARY}--\r\n")));
    }
}
