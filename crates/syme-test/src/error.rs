//! Test error types.

/// Errors raised while building a test request or reading its response.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The request target is not a valid URI.
    #[error("invalid request uri `{uri}`: {source}")]
    InvalidUri {
        /// Rejected target.
        uri: String,
        /// Parser error.
        #[source]
        source: http::uri::InvalidUri,
    },

    /// A header name or value is not valid HTTP.
    #[error("invalid header `{0}`")]
    InvalidHeader(String),

    /// The request body could not be encoded.
    #[error("body encoding failed: {0}")]
    Encode(String),

    /// The response body is not UTF-8.
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
