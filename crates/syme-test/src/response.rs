//! Test response wrapper.

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use syme_server::Outcome;

use crate::error::TestError;

/// A dispatched response with helpers for assertions.
///
/// Headers are kept in emission order, exactly as the server would write
/// them.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    kind: &'static str,
}

impl TestResponse {
    /// Materializes an [`Outcome`], streaming any asset into memory.
    pub fn from_outcome(outcome: Outcome) -> Self {
        let status = StatusCode::from_u16(outcome.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = outcome.headers();
        let kind = outcome.kind();

        let body = match outcome {
            Outcome::Send(negotiated) | Outcome::NotModified(negotiated) => negotiated.body,
            Outcome::Asset(delivery) => {
                let mut sink = Vec::new();
                if let Err(e) = delivery.stream(&mut sink) {
                    tracing::error!(error = %e, "asset transfer failed");
                    return Self::server_error();
                }
                Bytes::from(sink)
            }
            _ => Bytes::new(),
        };

        Self {
            status,
            headers,
            body,
            kind,
        }
    }

    /// The bare 500 sent when dispatch fails.
    pub fn server_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: Vec::new(),
            body: Bytes::new(),
            kind: "server_error",
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Name of the dispatch outcome, such as `send` or `not_modified`.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        self.kind
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Headers in emission order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header.
    #[must_use]
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns the Content-Length header value.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status differs.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "expected status {expected}, got {} ({})",
            self.status,
            self.kind
        );
        self
    }

    /// Asserts that a header is present with the given value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        match self.header(name) {
            Some(actual) => assert_eq!(
                actual, expected,
                "header {name}: expected {expected:?}, got {actual:?}"
            ),
            None => panic!("header {name} missing, headers: {:?}", self.headers),
        }
        self
    }

    /// Asserts that a header is absent.
    ///
    /// # Panics
    ///
    /// Panics if the header is present.
    pub fn assert_no_header(&self, name: &str) -> &Self {
        assert!(
            self.header(name).is_none(),
            "header {name} unexpectedly present"
        );
        self
    }

    /// Asserts the body text.
    ///
    /// # Panics
    ///
    /// Panics if the body differs or is not UTF-8.
    pub fn assert_text(&self, expected: &str) -> &Self {
        let actual = String::from_utf8_lossy(&self.body);
        assert_eq!(actual, expected, "unexpected body");
        self
    }
}
