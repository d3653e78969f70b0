//! Response negotiation.
//!
//! Turns the accumulated [`ResponseParts`] into the exact bytes and headers
//! sent to the client:
//!
//! - gzip when the client accepts it, compression is enabled and the body
//!   reaches the configured threshold
//! - an `Etag` computed from the final (possibly compressed) body
//! - a `304 Not Modified` short-circuit when `If-None-Match` matches and
//!   `If-Modified-Since` is absent or still inside the cache window
//! - otherwise the full cache header set
//!
//! `Vary` and `Content-Encoding` are computed first and are the only headers
//! carried by a 304.

use std::io::Write;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use md5::{Digest, Md5};
use syme_config::{CacheConfig, CompressionConfig, SymeConfig};
use syme_core::{Request, ResponseParts};

/// Final status, headers and body of a negotiated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Status code to send.
    pub status: u16,
    /// Headers in emission order.
    pub headers: Vec<(String, String)>,
    /// Body bytes, compressed if `Content-Encoding: gzip` is present.
    pub body: Bytes,
}

impl Negotiated {
    /// A bodiless reply carrying only `status`.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Returns true for a conditional-cache hit.
    pub const fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Computes cache validators and applies compression.
#[derive(Debug, Clone)]
pub struct Negotiator {
    cache: CacheConfig,
    compression: CompressionConfig,
    powered_by: Option<String>,
}

impl Negotiator {
    /// Builds a negotiator from the cache, compression and application sections.
    pub fn new(config: &SymeConfig) -> Self {
        Self {
            cache: config.cache.clone(),
            compression: config.compression.clone(),
            powered_by: config
                .application
                .powered_by
                .then(|| config.application.signature()),
        }
    }

    /// Negotiates `response` for `request` at the current time.
    pub fn negotiate(&self, request: &Request, response: &ResponseParts) -> Negotiated {
        self.negotiate_at(request, response, SystemTime::now())
    }

    /// Negotiates `response` as if the clock read `now`.
    pub fn negotiate_at(
        &self,
        request: &Request,
        response: &ResponseParts,
        now: SystemTime,
    ) -> Negotiated {
        let mut headers = vec![("Vary".to_string(), "If-None-Match".to_string())];

        let body = match self.compress(request, &response.body) {
            Some(compressed) => {
                headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
                Bytes::from(compressed)
            }
            None => Bytes::from(response.body.clone().into_bytes()),
        };

        let etag = hex::encode(Md5::digest(&body));
        let delay = Duration::from_secs(self.cache.delay_secs);

        if self.cache.enabled && is_fresh(request, &etag, delay, now) {
            tracing::debug!(etag = %etag, "conditional request matched");
            return Negotiated {
                status: 304,
                headers,
                body: Bytes::new(),
            };
        }

        headers.extend(response.headers.iter().cloned());
        if let Some(signature) = &self.powered_by {
            headers.push(("X-Powered-By".to_string(), signature.clone()));
        }
        headers.push(("Etag".to_string(), etag));
        if let Some(modified) = http_date(Some(now)) {
            headers.push(("Last-Modified".to_string(), modified));
        }
        if let Some(expires) = http_date(now.checked_add(delay)) {
            headers.push(("Expires".to_string(), expires));
        }
        headers.push(("Pragma".to_string(), "cache".to_string()));
        headers.push((
            "Cache-Control".to_string(),
            format!("max-age={}", self.cache.delay_secs),
        ));
        headers.push((
            "Content-Type".to_string(),
            format!("{}; charset: UTF-8", response.content_type),
        ));
        headers.push(("Content-Length".to_string(), body.len().to_string()));

        Negotiated {
            status: response.status,
            headers,
            body,
        }
    }

    fn compress(&self, request: &Request, body: &str) -> Option<Vec<u8>> {
        if !self.compression.enabled
            || body.len() < self.compression.min_size
            || !accepts_gzip(request.accepted_encodings())
        {
            return None;
        }

        let collapsed;
        let input = if self.compression.collapse_whitespace {
            collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
            collapsed.as_str()
        } else {
            body
        };

        match gzip(input.as_bytes(), self.compression.level) {
            Ok(compressed) => Some(compressed),
            Err(e) => {
                tracing::warn!(error = %e, "gzip failed, sending identity body");
                None
            }
        }
    }
}

fn gzip(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Returns true if the Accept-Encoding entries allow gzip.
///
/// Entries may carry a `q` parameter; a quality of zero is a refusal.
pub fn accepts_gzip(entries: &[String]) -> bool {
    entries.iter().any(|entry| {
        let mut parts = entry.split(';');
        let coding = parts.next().unwrap_or_default().trim();
        if !coding.eq_ignore_ascii_case("gzip") {
            return false;
        }

        let mut quality = 1.0f32;
        for param in parts {
            if let Some(q) = param.trim().strip_prefix("q=") {
                if let Ok(q) = q.trim().parse::<f32>() {
                    quality = q.clamp(0.0, 1.0);
                }
            }
        }
        quality > 0.0
    })
}

fn is_fresh(request: &Request, etag: &str, delay: Duration, now: SystemTime) -> bool {
    let Some(candidate) = request.header("if-none-match") else {
        return false;
    };
    if candidate.trim().trim_matches('"') != etag {
        return false;
    }

    match request.header("if-modified-since") {
        None => true,
        Some(since) => httpdate::parse_http_date(since.trim())
            // A window past the end of the clock never closes.
            .map(|since| since.checked_add(delay).map_or(true, |expiry| expiry > now))
            .unwrap_or(false),
    }
}

/// Formats `time` as an HTTP date, or `None` outside 1970..9999.
fn http_date(time: Option<SystemTime>) -> Option<String> {
    const LAST_HTTP_SECOND: u64 = 253_402_300_799;

    let secs = time?.duration_since(SystemTime::UNIX_EPOCH).ok()?.as_secs();
    (secs <= LAST_HTTP_SECOND)
        .then(|| httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use http::Method;
    use syme_config::SymeConfigBuilder;
    use syme_core::Transport;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut transport = Transport::new(Method::GET, "/page".parse().unwrap());
        for (name, value) in headers {
            transport = transport.header(name, value);
        }
        Request::from_transport(transport)
    }

    fn parts(body: &str) -> ResponseParts {
        ResponseParts {
            body: body.to_string(),
            ..ResponseParts::default()
        }
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn names(negotiated: &Negotiated) -> Vec<&str> {
        negotiated.headers.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn test_full_header_order() {
        let negotiator = Negotiator::new(&SymeConfig::default());
        let mut response = parts("hello");
        response.headers.push(("X-Custom".into(), "1".into()));

        let out = negotiator.negotiate_at(&request(&[]), &response, at(1_700_000_000));

        assert_eq!(out.status, 200);
        assert_eq!(
            names(&out),
            [
                "Vary",
                "X-Custom",
                "X-Powered-By",
                "Etag",
                "Last-Modified",
                "Expires",
                "Pragma",
                "Cache-Control",
                "Content-Type",
                "Content-Length",
            ]
        );
        assert_eq!(out.header("etag"), Some("5d41402abc4b2a76b9719d911017c592"));
        assert_eq!(out.header("cache-control"), Some("max-age=3600"));
        assert_eq!(out.header("content-type"), Some("text/html; charset: UTF-8"));
        assert_eq!(out.header("content-length"), Some("5"));
        assert_eq!(out.header("x-powered-by"), Some("Syme/0.1.0-dev"));
        assert_eq!(out.body, Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_expires_is_now_plus_delay() {
        let negotiator = Negotiator::new(&SymeConfig::default());
        let now = at(1_700_000_000);
        let out = negotiator.negotiate_at(&request(&[]), &parts("x"), now);

        assert_eq!(
            out.header("expires"),
            Some(httpdate::fmt_http_date(now + Duration::from_secs(3600)).as_str())
        );
        assert_eq!(
            out.header("last-modified"),
            Some(httpdate::fmt_http_date(now).as_str())
        );
    }

    #[test]
    fn test_unbounded_delay_skips_expires() {
        let config = SymeConfigBuilder::new()
            .cache(CacheConfig {
                enabled: true,
                delay_secs: u64::MAX,
            })
            .build();
        let negotiator = Negotiator::new(&config);

        let out = negotiator.negotiate(&request(&[]), &parts("hello"));
        assert_eq!(out.status, 200);
        assert!(out.header("last-modified").is_some());
        assert_eq!(out.header("expires"), None);
        assert_eq!(out.header("cache-control"), Some("max-age=18446744073709551615"));

        let since = httpdate::fmt_http_date(at(1_700_000_000));
        let conditional = request(&[
            ("If-None-Match", "5d41402abc4b2a76b9719d911017c592"),
            ("If-Modified-Since", since.as_str()),
        ]);
        let out = negotiator.negotiate(&conditional, &parts("hello"));
        assert_eq!(out.status, 304);
    }

    #[test]
    fn test_expires_past_year_9999_is_dropped() {
        let config = SymeConfigBuilder::new()
            .cache(CacheConfig {
                enabled: true,
                delay_secs: 300_000_000_000,
            })
            .build();
        let negotiator = Negotiator::new(&config);

        let out = negotiator.negotiate_at(&request(&[]), &parts("x"), at(1_700_000_000));
        assert_eq!(out.status, 200);
        assert_eq!(out.header("expires"), None);
        assert_eq!(
            out.header("last-modified"),
            Some(httpdate::fmt_http_date(at(1_700_000_000)).as_str())
        );
    }

    #[test]
    fn test_not_modified_without_since() {
        let negotiator = Negotiator::new(&SymeConfig::default());
        let etag = "5d41402abc4b2a76b9719d911017c592";

        let out = negotiator.negotiate_at(
            &request(&[("if-none-match", etag)]),
            &parts("hello"),
            at(1_700_000_000),
        );

        assert!(out.is_not_modified());
        assert!(out.body.is_empty());
        assert_eq!(names(&out), ["Vary"]);
    }

    #[test]
    fn test_quoted_etag_matches() {
        let negotiator = Negotiator::new(&SymeConfig::default());
        let out = negotiator.negotiate_at(
            &request(&[("if-none-match", "\"5d41402abc4b2a76b9719d911017c592\"")]),
            &parts("hello"),
            at(1_700_000_000),
        );
        assert!(out.is_not_modified());
    }

    #[test]
    fn test_if_modified_since_window() {
        let negotiator = Negotiator::new(&SymeConfig::default());
        let etag = "5d41402abc4b2a76b9719d911017c592";
        let now = at(1_700_000_000);

        let recent = httpdate::fmt_http_date(now - Duration::from_secs(60));
        let out = negotiator.negotiate_at(
            &request(&[("if-none-match", etag), ("if-modified-since", &recent)]),
            &parts("hello"),
            now,
        );
        assert_eq!(out.status, 304);

        let stale = httpdate::fmt_http_date(now - Duration::from_secs(7200));
        let out = negotiator.negotiate_at(
            &request(&[("if-none-match", etag), ("if-modified-since", &stale)]),
            &parts("hello"),
            now,
        );
        assert_eq!(out.status, 200);

        let out = negotiator.negotiate_at(
            &request(&[("if-none-match", etag), ("if-modified-since", "yesterday")]),
            &parts("hello"),
            now,
        );
        assert_eq!(out.status, 200);
    }

    #[test]
    fn test_cache_disabled_never_short_circuits() {
        let config = SymeConfigBuilder::new()
            .cache(CacheConfig {
                enabled: false,
                delay_secs: 3600,
            })
            .build();
        let negotiator = Negotiator::new(&config);

        let out = negotiator.negotiate_at(
            &request(&[("if-none-match", "5d41402abc4b2a76b9719d911017c592")]),
            &parts("hello"),
            at(1_700_000_000),
        );
        assert_eq!(out.status, 200);
    }

    #[test]
    fn test_gzip_above_threshold() {
        let negotiator = Negotiator::new(&SymeConfig::default());
        let body = "syme ".repeat(1000);

        let out = negotiator.negotiate_at(
            &request(&[("accept-encoding", "gzip, deflate")]),
            &parts(&body),
            at(1_700_000_000),
        );

        assert_eq!(names(&out)[..2], ["Vary", "Content-Encoding"]);
        assert_eq!(out.header("content-encoding"), Some("gzip"));
        assert_eq!(
            out.header("content-length"),
            Some(out.body.len().to_string().as_str())
        );
        assert_eq!(out.header("etag"), Some(hex::encode(Md5::digest(&out.body)).as_str()));

        let mut decoded = String::new();
        GzDecoder::new(&out.body[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_no_gzip_below_threshold_or_refused() {
        let negotiator = Negotiator::new(&SymeConfig::default());

        let out = negotiator.negotiate_at(
            &request(&[("accept-encoding", "gzip")]),
            &parts("short"),
            at(0),
        );
        assert!(out.header("content-encoding").is_none());

        let out = negotiator.negotiate_at(
            &request(&[("accept-encoding", "gzip;q=0, br")]),
            &parts(&"x".repeat(4096)),
            at(0),
        );
        assert!(out.header("content-encoding").is_none());
    }

    #[test]
    fn test_whitespace_collapse() {
        let config = SymeConfigBuilder::new()
            .compression(CompressionConfig {
                enabled: true,
                min_size: 1,
                level: 6,
                collapse_whitespace: true,
            })
            .build();
        let negotiator = Negotiator::new(&config);

        let out = negotiator.negotiate_at(
            &request(&[("accept-encoding", "gzip")]),
            &parts("  <p>\n\n   hi   there </p>\t"),
            at(0),
        );

        let mut decoded = String::new();
        GzDecoder::new(&out.body[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "<p> hi there </p>");
    }

    #[test]
    fn test_accepts_gzip() {
        let list = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(accepts_gzip(&list(&["gzip"])));
        assert!(accepts_gzip(&list(&["br", "gzip;q=0.5"])));
        assert!(!accepts_gzip(&list(&["gzip;q=0"])));
        assert!(!accepts_gzip(&list(&["deflate", "br"])));
        assert!(!accepts_gzip(&[]));
    }

    #[test]
    fn test_powered_by_disabled_in_production() {
        let negotiator = Negotiator::new(&SymeConfig::production());
        let out = negotiator.negotiate_at(&request(&[]), &parts("x"), at(0));
        assert!(out.header("x-powered-by").is_none());
    }
}
