//! The mutable response accumulator.
//!
//! A [`Response`] is a cheap handle: the dispatcher creates one per request and
//! every handler or middleware that asks for it mutates the same state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::value::Value;

/// Content type of a fresh response.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Returns true if `status` is accepted by [`Response::with_status`].
///
/// The whitelist covers 100-103, 200-208, 226, 300-308, 310, 400-419, 431,
/// 444, 449-451, 456, 495-499, 500-511 and 520-527.
#[must_use]
pub const fn is_valid_status(status: u16) -> bool {
    matches!(
        status,
        100..=103
            | 200..=208
            | 226
            | 300..=308
            | 310
            | 400..=419
            | 431
            | 444
            | 449..=451
            | 456
            | 495..=499
            | 500..=511
            | 520..=527
    )
}

/// Owned snapshot of a response, handed to the negotiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParts {
    /// Status code.
    pub status: u16,
    /// Header list in insertion order; keys may repeat.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
    /// Bare content type, without charset.
    pub content_type: String,
}

impl Default for ResponseParts {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: String::new(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

/// Shared, mutable response under construction.
///
/// # Example
///
/// ```
/// use syme_core::Response;
///
/// let response = Response::new();
/// response
///     .with_status(201)
///     .with_header("X-Trace", "abc")
///     .write("<h1>created</h1>");
///
/// // Out-of-whitelist codes are ignored.
/// response.with_status(299);
/// assert_eq!(response.status(), 201);
/// assert_eq!(response.header("x-trace").as_deref(), Some("abc"));
/// ```
#[derive(Clone, Default)]
pub struct Response {
    inner: Rc<RefCell<ResponseParts>>,
}

impl Response {
    /// Creates an empty `200 text/html` response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a response with an initial body and content type.
    #[must_use]
    pub fn with_body(body: impl Into<String>, content_type: impl Into<String>) -> Self {
        let response = Self::new();
        {
            let mut inner = response.inner.borrow_mut();
            inner.body = body.into();
            inner.content_type = content_type.into();
        }
        response
    }

    /// Returns true if both handles point at the same response.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.inner.borrow().status
    }

    /// Sets the status if it is whitelisted; otherwise keeps the current one.
    pub fn with_status(&self, status: u16) -> &Self {
        if is_valid_status(status) {
            self.inner.borrow_mut().status = status;
        } else {
            tracing::debug!(status, "status rejected");
        }
        self
    }

    /// Appends a header unless the exact same name (case-insensitive) and
    /// value pair is already present.
    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        let name = name.into();
        let value = value.into();
        let mut inner = self.inner.borrow_mut();
        let present = inner
            .headers
            .iter()
            .any(|(n, v)| n.eq_ignore_ascii_case(&name) && *v == value);
        if !present {
            inner.headers.push((name, value));
        }
        drop(inner);
        self
    }

    /// Appends several headers, normalizing each key to `Capitalized` form.
    pub fn with_headers<I, K, V>(&self, headers: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.with_header(capitalize(name.as_ref()), value);
        }
        self
    }

    /// Adds `Authorization: Bearer <token>`, accepting a token with or without
    /// its `Bearer ` prefix.
    pub fn with_bearer_authorization(&self, token: &str) -> &Self {
        let token = token.trim();
        let token = token
            .split_once(char::is_whitespace)
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map_or(token, |(_, rest)| rest.trim());
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Returns true if a header named `name` exists (case-insensitive).
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.inner
            .borrow()
            .headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Removes every header named `name` (case-insensitive). Returns true if
    /// anything was removed.
    pub fn remove_header(&self, name: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.headers.len();
        inner.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        inner.headers.len() != before
    }

    /// Headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        self.inner.borrow().headers.clone()
    }

    /// Appends HTML content and resets the content type to `text/html`.
    pub fn write(&self, content: &str) -> &Self {
        self.write_as(content, DEFAULT_CONTENT_TYPE)
    }

    /// Appends content and sets the content type.
    pub fn write_as(&self, content: &str, content_type: &str) -> &Self {
        let mut inner = self.inner.borrow_mut();
        inner.body.push_str(content);
        inner.content_type = content_type.to_string();
        drop(inner);
        self
    }

    /// Inserts content before the current body.
    pub fn prepend(&self, content: &str) -> &Self {
        self.inner.borrow_mut().body.insert_str(0, content);
        self
    }

    /// Appends content, keeping the content type.
    pub fn append(&self, content: &str) -> &Self {
        self.inner.borrow_mut().body.push_str(content);
        self
    }

    /// Replaces the body with pretty-printed JSON of `object`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; the response is left untouched.
    pub fn write_object<T: Serialize + ?Sized>(&self, object: &T) -> Result<&Self, serde_json::Error> {
        let json = serde_json::to_string_pretty(object)?;
        Ok(self.write_json(json))
    }

    /// Replaces the body with raw JSON text.
    pub fn write_json(&self, json: impl Into<String>) -> &Self {
        let mut inner = self.inner.borrow_mut();
        inner.body = json.into();
        inner.content_type = "application/json".to_string();
        drop(inner);
        self
    }

    /// Current body.
    #[must_use]
    pub fn content(&self) -> String {
        self.inner.borrow().body.clone()
    }

    /// Current content type.
    #[must_use]
    pub fn content_type(&self) -> String {
        self.inner.borrow().content_type.clone()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.inner.borrow().body)
    }

    /// Parses a form-urlencoded or JSON-object body into coerced scalars.
    ///
    /// Other content types and unparsable bodies give an empty map.
    #[must_use]
    pub fn parsed(&self) -> IndexMap<String, Value> {
        let inner = self.inner.borrow();
        let essence = inner
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/x-www-form-urlencoded" => {
                serde_urlencoded::from_str::<Vec<(String, String)>>(&inner.body)
                    .map(|pairs| {
                        pairs
                            .into_iter()
                            .map(|(k, v)| (k, Value::coerce_scalar(&v)))
                            .collect()
                    })
                    .unwrap_or_default()
            }
            "application/json" => {
                serde_json::from_str::<IndexMap<String, serde_json::Value>>(&inner.body)
                    .map(|object| {
                        object
                            .into_iter()
                            .map(|(k, v)| (k, json_scalar(v)))
                            .collect()
                    })
                    .unwrap_or_default()
            }
            _ => IndexMap::new(),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn parts(&self) -> ResponseParts {
        self.inner.borrow().clone()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Response")
            .field("status", &inner.status)
            .field("content_type", &inner.content_type)
            .field("headers", &inner.headers.len())
            .field("body_len", &inner.body.len())
            .finish()
    }
}

fn json_scalar(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(s) => Value::coerce_scalar(&s),
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .unwrap_or_else(|| Value::Text(n.to_string())),
        other => Value::Text(other.to_string()),
    }
}

/// `content-TYPE` becomes `Content-type`.
fn capitalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}
