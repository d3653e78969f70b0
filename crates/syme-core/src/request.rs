//! The immutable inbound request snapshot.
//!
//! A [`Request`] is built once from a [`Transport`] (the raw values handed over
//! by whatever accepted the connection) and never changes afterwards. Cloning
//! is cheap and every clone sees the same snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Uri};
use indexmap::IndexMap;

use syme_router::normalize_uri;

use crate::upload::UploadedFiles;
use crate::value::Value;

/// Content type assumed when the client sends none.
pub const DEFAULT_REQUEST_CONTENT_TYPE: &str = "text/html";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Headers consulted, in order, for the client address.
const REMOTE_ADDRESS_HEADERS: [&str; 5] = [
    "client-ip",
    "cf-connecting-ip",
    "x-forwarded",
    "x-forwarded-for",
    "forwarded",
];

/// Raw connection-level values a [`Request`] is built from.
///
/// Nothing is read from ambient process state; the boundary fills this in.
#[derive(Debug, Clone)]
pub struct Transport {
    /// Request method.
    pub method: Method,
    /// Request target, origin-form or absolute-form.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Bytes,
    /// `http` or `https`.
    pub scheme: String,
    /// Peer socket address.
    pub remote_addr: Option<SocketAddr>,
    /// Application mount point, stripped from the path to form the uri.
    pub root_path: String,
    /// Files already extracted from a multipart body.
    pub files: UploadedFiles,
}

impl Transport {
    /// A bodiless transport for `method` and `uri`.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            scheme: "http".to_string(),
            remote_addr: None,
            root_path: "/".to_string(),
            files: UploadedFiles::new(),
        }
    }

    /// Sets a header, ignoring names or values that are not valid HTTP.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the scheme.
    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the application root.
    #[must_use]
    pub fn root_path(mut self, root: impl Into<String>) -> Self {
        self.root_path = root.into();
        self
    }

    /// Attaches uploaded files.
    #[must_use]
    pub fn files(mut self, files: UploadedFiles) -> Self {
        self.files = files;
        self
    }
}

#[derive(Debug)]
struct Inner {
    method: Method,
    full_url: String,
    url: String,
    path: String,
    uri: String,
    root_path: String,
    query: IndexMap<String, String>,
    fragment: Option<String>,
    scheme: String,
    host: String,
    port: Option<u16>,
    headers: HeaderMap,
    accepted_languages: Vec<String>,
    accepted_encodings: Vec<String>,
    accepted_types: Vec<String>,
    user_agent: Option<String>,
    remote_address: String,
    remote_port: u16,
    authorization: Option<String>,
    referer: Option<String>,
    content_type: String,
    content: Bytes,
    form: Option<IndexMap<String, Value>>,
    files: UploadedFiles,
}

/// Immutable snapshot of one inbound HTTP transaction.
///
/// # Example
///
/// ```
/// use http::Method;
/// use syme_core::{Request, Transport};
///
/// let transport = Transport::new(Method::POST, "/app/users/?page=2".parse().unwrap())
///     .root_path("/app")
///     .header("host", "example.com:8443")
///     .header("content-type", "application/x-www-form-urlencoded")
///     .body("age=42&admin=false");
/// let request = Request::from_transport(transport);
///
/// assert_eq!(request.path(), "/app/users");
/// assert_eq!(request.uri(), "/users");
/// assert_eq!(request.host(), "example.com");
/// assert_eq!(request.argument("page"), Some("2"));
/// assert_eq!(request.form_value("age").and_then(|v| v.as_i64()), Some(42));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

impl Request {
    /// Builds the snapshot from raw transport values.
    pub fn from_transport(transport: Transport) -> Self {
        let Transport {
            method,
            uri,
            headers,
            body,
            scheme,
            remote_addr,
            root_path,
            files,
        } = transport;

        let scheme = uri
            .scheme_str()
            .map_or(scheme, str::to_string)
            .to_ascii_lowercase();

        let authority = last_entry(&headers, "x-forwarded-host")
            .or_else(|| header_str(&headers, "host").map(str::to_string))
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default();
        let (host, port) = split_authority(&authority);

        let path = normalize_uri(uri.path().trim());
        let root_path = normalize_uri(&root_path);
        let uri_part = strip_root(&path, &root_path);

        let query_string = uri.query().unwrap_or_default();
        let query = parse_pairs(query_string);

        let origin = match port {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        };
        let url = if path == "/" { origin.clone() } else { format!("{origin}{path}") };
        let full_url = if query_string.is_empty() {
            url.clone()
        } else {
            format!("{url}?{query_string}")
        };

        let content_type = header_str(&headers, "content-type")
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_REQUEST_CONTENT_TYPE.to_string());

        let form = (content_type == FORM_URLENCODED)
            .then(|| std::str::from_utf8(&body).map(parse_form).ok())
            .flatten()
            .filter(|form| !form.is_empty());

        let accepted_types = header_str(&headers, "accept")
            .and_then(|accept| accept.split(';').next())
            .map(|first| split_list(first, false))
            .unwrap_or_default();

        let remote_address = REMOTE_ADDRESS_HEADERS
            .iter()
            .find_map(|name| header_str(&headers, name).and_then(|value| client_ip(name, value)))
            .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let inner = Inner {
            accepted_languages: header_str(&headers, "accept-language")
                .map(|v| split_list(v, false))
                .unwrap_or_default(),
            accepted_encodings: header_str(&headers, "accept-encoding")
                .map(|v| split_list(v, true))
                .unwrap_or_default(),
            accepted_types,
            user_agent: header_str(&headers, "user-agent").map(str::to_string),
            authorization: header_str(&headers, "authorization").map(str::to_string),
            referer: header_str(&headers, "referer").map(str::to_string),
            remote_address,
            remote_port: remote_addr.map_or(0, |addr| addr.port()),
            method,
            full_url,
            url,
            path,
            uri: uri_part,
            root_path,
            query,
            fragment: None,
            scheme,
            host,
            port,
            headers,
            content_type,
            content: body,
            form,
            files,
        };

        Self { inner: Arc::new(inner) }
    }

    /// Builds a bodiless GET request for an absolute or origin-form url.
    ///
    /// A `#fragment` is kept on the snapshot. Returns `None` if `url` is not a
    /// valid request target.
    pub fn get(url: &str) -> Option<Self> {
        let (target, fragment) = match url.split_once('#') {
            Some((target, fragment)) => (target, Some(fragment.to_string())),
            None => (url, None),
        };
        let uri: Uri = target.parse().ok()?;
        let mut request = Self::from_transport(Transport::new(Method::GET, uri));
        if let Some(inner) = Arc::get_mut(&mut request.inner) {
            inner.fragment = fragment.filter(|f| !f.is_empty());
        }
        Some(request)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Url including the query string, without a trailing slash.
    pub fn full_url(&self) -> &str {
        &self.inner.full_url
    }

    /// Url without the query string.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Normalized path.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Path relative to the application root; this is what routes match.
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// Normalized application root.
    pub fn root_path(&self) -> &str {
        &self.inner.root_path
    }

    /// Decoded query pairs; a repeated key keeps its last value.
    pub fn query(&self) -> &IndexMap<String, String> {
        &self.inner.query
    }

    /// Url fragment, only present on requests built from a url.
    pub fn fragment(&self) -> Option<&str> {
        self.inner.fragment.as_deref()
    }

    /// Lowercased scheme.
    pub fn scheme(&self) -> &str {
        &self.inner.scheme
    }

    /// Host name, without port.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Explicit port of the host, if any.
    pub fn port(&self) -> Option<u16> {
        self.inner.port
    }

    /// `scheme://host[:port]/path`.
    pub fn domain(&self) -> String {
        let mut domain = format!("{}://{}", self.inner.scheme, self.inner.host);
        if let Some(port) = self.inner.port {
            domain.push_str(&format!(":{port}"));
        }
        domain.push_str(&self.inner.path);
        domain
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Returns true if header `name` is present.
    pub fn has_header(&self, name: &str) -> bool {
        self.inner.headers.contains_key(name)
    }

    /// First value of header `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.inner.headers, name)
    }

    /// Accept-Language entries, in header order.
    pub fn accepted_languages(&self) -> &[String] {
        &self.inner.accepted_languages
    }

    /// Lowercased Accept-Encoding entries, parameters included.
    pub fn accepted_encodings(&self) -> &[String] {
        &self.inner.accepted_encodings
    }

    /// Media ranges listed before the first parameter of Accept.
    pub fn accepted_types(&self) -> &[String] {
        &self.inner.accepted_types
    }

    /// User-Agent header.
    pub fn user_agent(&self) -> Option<&str> {
        self.inner.user_agent.as_deref()
    }

    /// Best guess at the client address; `0.0.0.0` when unknown.
    pub fn remote_address(&self) -> &str {
        &self.inner.remote_address
    }

    /// Peer port, `0` when unknown.
    pub fn remote_port(&self) -> u16 {
        self.inner.remote_port
    }

    /// Authorization header.
    pub fn authorization(&self) -> Option<&str> {
        self.inner.authorization.as_deref()
    }

    /// Referer header.
    pub fn referer(&self) -> Option<&str> {
        self.inner.referer.as_deref()
    }

    /// Lowercased body media type, `text/html` if unspecified.
    pub fn content_type(&self) -> &str {
        &self.inner.content_type
    }

    /// Raw body.
    pub fn content(&self) -> &Bytes {
        &self.inner.content
    }

    /// Parsed form, present only for non-empty urlencoded bodies.
    pub fn form(&self) -> Option<&IndexMap<String, Value>> {
        self.inner.form.as_ref()
    }

    /// Returns true if the body was a non-empty urlencoded form.
    pub fn has_form(&self) -> bool {
        self.inner.form.is_some()
    }

    /// One coerced form value.
    pub fn form_value(&self, name: &str) -> Option<&Value> {
        self.inner.form.as_ref().and_then(|form| form.get(name))
    }

    /// Uploaded files.
    pub fn files(&self) -> &UploadedFiles {
        &self.inner.files
    }

    /// Returns true if the query string carries `name`.
    pub fn has_argument(&self, name: &str) -> bool {
        self.inner.query.contains_key(name)
    }

    /// Query value for `name`.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.inner.query.get(name).map(String::as_str)
    }

    /// Returns true for `X-Requested-With: XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn last_entry(headers: &HeaderMap, name: &str) -> Option<String> {
    header_str(headers, name)
        .and_then(|value| value.rsplit(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_authority(authority: &str) -> (String, Option<u16>) {
    let authority = authority.trim();
    // IPv6 literals keep their brackets.
    if let Some(end) = authority.find(']') {
        let host = authority[..=end].to_string();
        let port = authority[end + 1..]
            .strip_prefix(':')
            .and_then(|p| p.parse().ok());
        return (host, port);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().ok()),
        None => (authority.to_string(), None),
    }
}

fn strip_root(path: &str, root: &str) -> String {
    if root == "/" {
        return path.to_string();
    }
    match path.strip_prefix(root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => normalize_uri(rest),
        _ => path.to_string(),
    }
}

fn split_list(value: &str, lowercase: bool) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if lowercase {
                entry.to_ascii_lowercase()
            } else {
                entry.to_string()
            }
        })
        .collect()
}

fn parse_pairs(raw: &str) -> IndexMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}

fn parse_form(raw: &str) -> IndexMap<String, Value> {
    parse_pairs(raw)
        .into_iter()
        .map(|(key, value)| (key, Value::coerce_sanitized(&value)))
        .collect()
}

fn client_ip(header: &str, value: &str) -> Option<String> {
    let first = value.split(',').next()?.trim();
    let ip = if header == "forwarded" {
        first
            .split(';')
            .find_map(|part| {
                let (key, value) = part.trim().split_once('=')?;
                key.eq_ignore_ascii_case("for").then_some(value)
            })?
            .trim_matches('"')
    } else {
        first
    };
    (!ip.is_empty()).then(|| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(transport: Transport) -> Request {
        Request::from_transport(transport)
    }

    fn get(target: &str) -> Transport {
        Transport::new(Method::GET, target.parse().unwrap()).header("host", "example.com")
    }

    #[test]
    fn test_path_and_uri() {
        let request = build(get("/users/42/"));
        assert_eq!(request.path(), "/users/42");
        assert_eq!(request.uri(), "/users/42");
        assert_eq!(request.url(), "http://example.com/users/42");
        assert_eq!(request.full_url(), "http://example.com/users/42");
    }

    #[test]
    fn test_root_path_is_stripped() {
        let request = build(get("/blog/posts").root_path("/blog/"));
        assert_eq!(request.root_path(), "/blog");
        assert_eq!(request.uri(), "/posts");

        let request = build(get("/blog").root_path("/blog"));
        assert_eq!(request.uri(), "/");

        let request = build(get("/blogger").root_path("/blog"));
        assert_eq!(request.uri(), "/blogger");
    }

    #[test]
    fn test_query_and_full_url() {
        let request = build(get("/search?q=rust+lang&page=2"));
        assert_eq!(request.argument("q"), Some("rust lang"));
        assert!(request.has_argument("page"));
        assert!(!request.has_argument("missing"));
        assert_eq!(request.full_url(), "http://example.com/search?q=rust+lang&page=2");
    }

    #[test]
    fn test_forwarded_host_wins() {
        let request = build(
            get("/")
                .header("x-forwarded-host", "proxy.internal, public.example.org:8443"),
        );
        assert_eq!(request.host(), "public.example.org");
        assert_eq!(request.port(), Some(8443));
        assert_eq!(request.url(), "http://public.example.org:8443");
    }

    #[test]
    fn test_domain() {
        let request = build(get("/a/b?x=1").header("host", "ignored"));
        assert_eq!(request.domain(), "http://example.com/a/b");
    }

    #[test]
    fn test_accept_lists() {
        let request = build(
            get("/")
                .header("accept-language", "fr-FR, en;q=0.5")
                .header("accept-encoding", "GZIP, deflate , br")
                .header("accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        assert_eq!(request.accepted_languages(), ["fr-FR", "en;q=0.5"]);
        assert_eq!(request.accepted_encodings(), ["gzip", "deflate", "br"]);
        assert_eq!(request.accepted_types(), ["text/html", "application/xhtml+xml"]);
    }

    #[test]
    fn test_remote_address_chain() {
        let peer: SocketAddr = "10.0.0.9:51000".parse().unwrap();

        let request = build(get("/").remote_addr(peer));
        assert_eq!(request.remote_address(), "10.0.0.9");
        assert_eq!(request.remote_port(), 51000);

        let request = build(get("/").remote_addr(peer).header("x-forwarded-for", "1.2.3.4, 10.0.0.1"));
        assert_eq!(request.remote_address(), "1.2.3.4");

        let request = build(
            get("/")
                .header("forwarded", "for=\"5.6.7.8\";proto=https")
                .header("client-ip", "9.9.9.9"),
        );
        assert_eq!(request.remote_address(), "9.9.9.9");

        let request = build(get("/").header("forwarded", "proto=https;for=5.6.7.8"));
        assert_eq!(request.remote_address(), "5.6.7.8");

        assert_eq!(build(get("/")).remote_address(), "0.0.0.0");
    }

    #[test]
    fn test_form_parsing_only_for_urlencoded() {
        let request = build(
            Transport::new(Method::POST, "/login".parse().unwrap())
                .header("content-type", "application/x-www-form-urlencoded; charset=UTF-8")
                .body("user=%3Cb%3Eal%3C%2Fb%3E&remember=TRUE&tries=3"),
        );
        assert!(request.has_form());
        assert_eq!(request.content_type(), "application/x-www-form-urlencoded");
        assert_eq!(request.form_value("user"), Some(&Value::Text("&lt;b&gt;al&lt;/b&gt;".into())));
        assert_eq!(request.form_value("remember"), Some(&Value::Bool(true)));
        assert_eq!(request.form_value("tries"), Some(&Value::Int(3)));

        let request = build(
            Transport::new(Method::POST, "/api".parse().unwrap())
                .header("content-type", "application/json")
                .body(r#"{"a":1}"#),
        );
        assert!(!request.has_form());
        assert_eq!(request.content().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn test_empty_form_is_absent() {
        let request = build(
            Transport::new(Method::POST, "/".parse().unwrap())
                .header("content-type", "application/x-www-form-urlencoded"),
        );
        assert!(!request.has_form());
    }

    #[test]
    fn test_default_content_type() {
        assert_eq!(build(get("/")).content_type(), "text/html");
    }

    #[test]
    fn test_xhr_and_optional_headers() {
        let request = build(
            get("/")
                .header("x-requested-with", "XMLHttpRequest")
                .header("referer", "http://example.com/from")
                .header("authorization", "Bearer t0k3n")
                .header("user-agent", "curl/8.0"),
        );
        assert!(request.is_xhr());
        assert_eq!(request.referer(), Some("http://example.com/from"));
        assert_eq!(request.authorization(), Some("Bearer t0k3n"));
        assert_eq!(request.user_agent(), Some("curl/8.0"));
        assert!(!build(get("/")).is_xhr());
    }

    #[test]
    fn test_get_from_absolute_url() {
        let request = Request::get("https://shop.example.com:8443/cart/?item=3#summary").unwrap();
        assert_eq!(*request.method(), Method::GET);
        assert_eq!(request.scheme(), "https");
        assert_eq!(request.host(), "shop.example.com");
        assert_eq!(request.port(), Some(8443));
        assert_eq!(request.uri(), "/cart");
        assert_eq!(request.argument("item"), Some("3"));
        assert_eq!(request.fragment(), Some("summary"));
    }

    #[test]
    fn test_get_rejects_garbage() {
        assert!(Request::get("http://exa mple.com/").is_none());
    }

    #[test]
    fn test_clones_share_snapshot() {
        let request = build(get("/x"));
        let clone = request.clone();
        assert!(Arc::ptr_eq(&request.inner, &clone.inner));
    }
}
