//! Static asset streaming.
//!
//! A request whose uri names a readable regular file under the asset root is
//! served from disk before any route is consulted. Single byte ranges of the
//! form `bytes=start-[end]` are honoured with a 206; anything else gets the
//! whole file with a 200.
//!
//! # Security
//!
//! - `..` components are refused outright
//! - the canonical path must stay under the canonical root, so symlinks
//!   cannot escape it
//!
//! # Example
//!
//! ```rust,no_run
//! use syme_config::AssetsConfig;
//! use syme_server::assets::Assets;
//!
//! let assets = Assets::new(&AssetsConfig::default());
//! if let Some(path) = assets.resolve("/css/site.css") {
//!     let delivery = assets.prepare(&path, Some("bytes=0-99")).unwrap();
//!     assert_eq!(delivery.status(), 206);
//! }
//! ```

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use bytes::Bytes;
use regex::Regex;
use syme_config::{AssetsConfig, MAX_CHUNK_SIZE};

use crate::error::AssetError;

/// Destination of streamed asset bytes.
///
/// The streamer asks [`AssetSink::is_connected`] before every chunk and
/// stops quietly once it returns false.
pub trait AssetSink {
    /// Returns true while the client is still listening.
    fn is_connected(&self) -> bool;

    /// Delivers one chunk. Returns false if the client went away.
    fn write_chunk(&mut self, chunk: Bytes) -> bool;
}

impl AssetSink for Vec<u8> {
    fn is_connected(&self) -> bool {
        true
    }

    fn write_chunk(&mut self, chunk: Bytes) -> bool {
        self.extend_from_slice(&chunk);
        true
    }
}

/// The static asset directory.
#[derive(Debug, Clone)]
pub struct Assets {
    root: PathBuf,
    chunk_size: usize,
}

impl Assets {
    /// Serves files below `config.path`, in chunks of `config.chunk_size()`.
    pub fn new(config: &AssetsConfig) -> Self {
        Self {
            root: config.path.clone(),
            chunk_size: config.chunk_size().clamp(1, MAX_CHUNK_SIZE),
        }
    }

    /// The configured root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes read and written per transfer step.
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Maps a request uri to a readable regular file under the root.
    ///
    /// Returns `None` for anything else, including directories, missing
    /// files and paths that would leave the root.
    pub fn resolve(&self, uri: &str) -> Option<PathBuf> {
        let relative = uri.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return None,
            }
        }

        let canonical = self.root.join(relative).canonicalize().ok()?;
        let canonical_root = self.root.canonicalize().ok()?;
        if !canonical.starts_with(&canonical_root) {
            tracing::debug!(uri = %uri, "asset path escapes root");
            return None;
        }

        let metadata = fs::metadata(&canonical).ok()?;
        if !metadata.is_file() || File::open(&canonical).is_err() {
            return None;
        }
        Some(canonical)
    }

    /// Opens `path` and computes status and headers for an optional `Range`
    /// header value.
    pub fn prepare(&self, path: &Path, range: Option<&str>) -> Result<AssetDelivery, AssetError> {
        let open_error = |source| AssetError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_error)?;
        let metadata = file.metadata().map_err(open_error)?;
        let size = metadata.len();

        let span = range.and_then(|value| parse_range(value, size));
        let (status, start, length) = match span {
            Some((start, end)) => (206, start, end - start + 1),
            None => (200, 0, size),
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut headers = vec![
            ("Content-Type".to_string(), mime_for(path).to_string()),
            (
                "Cache-Control".to_string(),
                "public, must-revalidate, max-age=0".to_string(),
            ),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("Accept-Ranges".to_string(), "bytes".to_string()),
            ("Content-Length".to_string(), length.to_string()),
        ];
        if let Some((start, end)) = span {
            headers.push((
                "Content-Range".to_string(),
                format!("bytes {start}-{end}/{size}"),
            ));
        }
        headers.push((
            "Content-Disposition".to_string(),
            format!("inline; filename={filename}"),
        ));
        headers.push(("Content-Transfer-Encoding".to_string(), "binary".to_string()));
        if let Ok(modified) = metadata.modified() {
            headers.push(("Last-Modified".to_string(), httpdate::fmt_http_date(modified)));
        }

        Ok(AssetDelivery {
            path: path.to_path_buf(),
            file,
            status,
            headers,
            start,
            length,
            chunk_size: self.chunk_size,
        })
    }
}

/// An opened asset ready to be streamed.
#[derive(Debug)]
pub struct AssetDelivery {
    path: PathBuf,
    file: File,
    status: u16,
    headers: Vec<(String, String)>,
    start: u64,
    length: u64,
    chunk_size: usize,
}

impl AssetDelivery {
    /// 200 for the whole file, 206 for a range.
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Headers in emission order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Bytes that a complete transfer sends.
    pub const fn len(&self) -> u64 {
        self.length
    }

    /// Returns true if the transfer sends nothing.
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The file being served.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies the selected bytes into `sink`, one chunk at a time.
    ///
    /// Returns the number of bytes delivered. A client that disconnects
    /// ends the transfer early without an error.
    pub fn stream<S: AssetSink + ?Sized>(mut self, sink: &mut S) -> Result<u64, AssetError> {
        self.file
            .seek(SeekFrom::Start(self.start))
            .map_err(AssetError::Read)?;

        let mut remaining = self.length;
        let mut sent = 0u64;
        let mut buffer = vec![0u8; self.chunk_size];

        while remaining > 0 {
            if !sink.is_connected() {
                tracing::debug!(path = %self.path.display(), bytes = sent, "client gone, transfer aborted");
                return Ok(sent);
            }

            let step = usize::try_from(remaining).map_or(self.chunk_size, |r| r.min(self.chunk_size));
            let chunk = &mut buffer[..step];
            self.file.read_exact(chunk).map_err(AssetError::Read)?;

            if !sink.write_chunk(Bytes::copy_from_slice(chunk)) {
                tracing::debug!(path = %self.path.display(), bytes = sent, "client gone, transfer aborted");
                return Ok(sent);
            }
            sent += step as u64;
            remaining -= step as u64;
        }

        tracing::debug!(path = %self.path.display(), bytes = sent, "asset sent");
        Ok(sent)
    }
}

fn range_pattern() -> Option<&'static Regex> {
    static RANGE: OnceLock<Option<Regex>> = OnceLock::new();
    RANGE
        .get_or_init(|| Regex::new(r"(?i)bytes=[ \t]*(\d+)-(\d*)").ok())
        .as_ref()
}

/// Parses a `Range` header against a file of `size` bytes.
///
/// Returns the inclusive byte span, or `None` when the header is malformed
/// or cannot be satisfied. An end past the last byte is clamped.
pub fn parse_range(value: &str, size: u64) -> Option<(u64, u64)> {
    let captures = range_pattern()?.captures(value)?;
    let start: u64 = captures.get(1)?.as_str().parse().ok()?;
    let last = size.checked_sub(1)?;
    let end = match captures.get(2).map(|m| m.as_str()) {
        Some(digits) if !digits.is_empty() => digits.parse::<u64>().ok()?.min(last),
        _ => last,
    };

    (start <= end).then_some((start, end))
}

/// Content type served for `path`, by extension.
pub fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",

        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",

        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",

        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let hundred: Vec<u8> = (0u8..100).collect();
        fs::write(dir.path().join("data.bin"), &hundred).unwrap();
        fs::write(dir.path().join("style.css"), "body { color: red }").unwrap();
        fs::write(dir.path().join("empty.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("page.html"), "<p>sub</p>").unwrap();
        dir
    }

    fn assets(dir: &TempDir, packet_size: usize) -> Assets {
        Assets::new(&AssetsConfig {
            path: dir.path().to_path_buf(),
            packet_size,
            packet_multiplier: 1,
        })
    }

    struct Disconnecting {
        received: Vec<u8>,
        budget: usize,
    }

    impl AssetSink for Disconnecting {
        fn is_connected(&self) -> bool {
            self.budget > 0
        }

        fn write_chunk(&mut self, chunk: Bytes) -> bool {
            self.budget -= 1;
            self.received.extend_from_slice(&chunk);
            true
        }
    }

    #[test]
    fn test_resolve_existing_files() {
        let dir = create_test_dir();
        let assets = assets(&dir, 1024);

        assert!(assets.resolve("/data.bin").is_some());
        assert!(assets.resolve("/sub/page.html").is_some());
        assert!(assets.resolve("/").is_none());
        assert!(assets.resolve("/sub").is_none());
        assert!(assets.resolve("/missing.txt").is_none());
    }

    #[test]
    fn test_chunk_size_is_capped() {
        let dir = create_test_dir();
        let huge = Assets::new(&AssetsConfig {
            path: dir.path().to_path_buf(),
            packet_size: usize::MAX,
            packet_multiplier: 2,
        });
        assert_eq!(huge.chunk_size(), MAX_CHUNK_SIZE);
        assert_eq!(assets(&dir, 0).chunk_size(), 1);
    }

    #[test]
    fn test_directory_traversal_blocked() {
        let dir = create_test_dir();
        let assets = Assets::new(&AssetsConfig {
            path: dir.path().join("sub"),
            ..AssetsConfig::default()
        });

        assert!(assets.resolve("/page.html").is_some());
        assert!(assets.resolve("/../data.bin").is_none());
        assert!(assets.resolve("/./../style.css").is_none());
    }

    #[test]
    fn test_full_transfer() {
        let dir = create_test_dir();
        let assets = assets(&dir, 16);
        let path = assets.resolve("/data.bin").unwrap();

        let delivery = assets.prepare(&path, None).unwrap();
        assert_eq!(delivery.status(), 200);
        assert_eq!(delivery.header("content-length"), Some("100"));
        assert!(delivery.header("content-range").is_none());

        let mut body = Vec::new();
        assert_eq!(delivery.stream(&mut body).unwrap(), 100);
        assert_eq!(body, (0u8..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_range_request_partial_content() {
        let dir = create_test_dir();
        let assets = assets(&dir, 4);
        let path = assets.resolve("/data.bin").unwrap();

        let delivery = assets.prepare(&path, Some("bytes=10-20")).unwrap();
        assert_eq!(delivery.status(), 206);
        assert_eq!(delivery.header("content-length"), Some("11"));
        assert_eq!(delivery.header("content-range"), Some("bytes 10-20/100"));

        let mut body = Vec::new();
        delivery.stream(&mut body).unwrap();
        assert_eq!(body, (10u8..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_open_ended_range() {
        let dir = create_test_dir();
        let assets = assets(&dir, 1024);
        let path = assets.resolve("/data.bin").unwrap();

        let delivery = assets.prepare(&path, Some("BYTES= 95-")).unwrap();
        assert_eq!(delivery.status(), 206);
        assert_eq!(delivery.header("content-range"), Some("bytes 95-99/100"));
    }

    #[test]
    fn test_unsatisfiable_range_serves_whole_file() {
        let dir = create_test_dir();
        let assets = assets(&dir, 1024);
        let path = assets.resolve("/data.bin").unwrap();

        for range in ["bytes=150-200", "bytes=30-10", "items=0-5", "bytes=-5"] {
            let delivery = assets.prepare(&path, Some(range)).unwrap();
            assert_eq!(delivery.status(), 200, "{range}");
            assert_eq!(delivery.len(), 100);
        }
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-4", 10), Some((0, 4)));
        assert_eq!(parse_range("bytes=5-", 10), Some((5, 9)));
        assert_eq!(parse_range("bytes=5-400", 10), Some((5, 9)));
        assert_eq!(parse_range("bytes=0-0", 0), None);
        assert_eq!(parse_range("garbage", 10), None);
    }

    #[test]
    fn test_header_order() {
        let dir = create_test_dir();
        let assets = assets(&dir, 1024);
        let path = assets.resolve("/style.css").unwrap();

        let delivery = assets.prepare(&path, Some("bytes=0-3")).unwrap();
        let names: Vec<&str> = delivery.headers().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            [
                "Content-Type",
                "Cache-Control",
                "Pragma",
                "Accept-Ranges",
                "Content-Length",
                "Content-Range",
                "Content-Disposition",
                "Content-Transfer-Encoding",
                "Last-Modified",
            ]
        );
        assert_eq!(delivery.header("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(delivery.header("content-disposition"), Some("inline; filename=style.css"));
    }

    #[test]
    fn test_disconnect_stops_transfer() {
        let dir = create_test_dir();
        let assets = assets(&dir, 10);
        let path = assets.resolve("/data.bin").unwrap();

        let mut sink = Disconnecting {
            received: Vec::new(),
            budget: 3,
        };
        let sent = assets.prepare(&path, None).unwrap().stream(&mut sink).unwrap();

        assert_eq!(sent, 30);
        assert_eq!(sink.received.len(), 30);
    }

    #[test]
    fn test_empty_file() {
        let dir = create_test_dir();
        let assets = assets(&dir, 1024);
        let path = assets.resolve("/empty.txt").unwrap();

        let delivery = assets.prepare(&path, Some("bytes=0-")).unwrap();
        assert_eq!(delivery.status(), 200);
        assert!(delivery.is_empty());

        let mut body = Vec::new();
        assert_eq!(delivery.stream(&mut body).unwrap(), 0);
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("app.js")), "text/javascript; charset=utf-8");
        assert_eq!(mime_for(Path::new("blob")), "application/octet-stream");
    }
}
