//! Conversion of wire-level requests into [`Transport`] values.
//!
//! Multipart bodies are parsed here: every file part is spooled to the
//! system temp directory and described by an [`UploadedFile`]. Text parts
//! are not turned into form values.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;
use http::request::Parts;
use http::header;
use syme_config::SymeConfig;
use syme_core::{Transport, UploadError, UploadedFile, UploadedFiles};
use uuid::Uuid;

/// Builds the transport for a request whose body has been collected.
pub async fn from_parts(
    parts: Parts,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    config: &SymeConfig,
) -> Transport {
    let files = match multipart_boundary(&parts.headers) {
        Some(boundary) => spool_uploads(body.clone(), boundary, &std::env::temp_dir()).await,
        None => UploadedFiles::new(),
    };

    Transport {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
        scheme: config.server.scheme.clone(),
        remote_addr,
        root_path: config.application.root_path.clone(),
        files,
    }
}

fn multipart_boundary(headers: &http::HeaderMap) -> Option<String> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    if !content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return None;
    }
    multer::parse_boundary(content_type).ok()
}

/// Writes every file part of a multipart body into `dir`.
///
/// A malformed body yields whatever parts were read before the error.
pub async fn spool_uploads(body: Bytes, boundary: String, dir: &std::path::Path) -> UploadedFiles {
    let stream = futures_util::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut files = UploadedFiles::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "malformed multipart body");
                break;
            }
        };

        let Some(client_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let field_name = field.name().unwrap_or_default().to_string();
        let declared_type = field
            .content_type()
            .map_or_else(|| "application/octet-stream".to_string(), ToString::to_string);
        let temp_path = temp_path_in(dir);

        let file = match field.bytes().await {
            Ok(data) if client_name.trim().is_empty() && data.is_empty() => {
                UploadedFile::new(client_name, declared_type, 0, PathBuf::new())
                    .with_error(UploadError::NoFile)
            }
            Ok(data) => match tokio::fs::write(&temp_path, &data).await {
                Ok(()) => UploadedFile::new(client_name, declared_type, data.len() as u64, temp_path),
                Err(e) => {
                    tracing::warn!(error = %e, path = %temp_path.display(), "upload spool failed");
                    UploadedFile::new(client_name, declared_type, 0, temp_path)
                        .with_error(UploadError::CantWrite)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, field = %field_name, "upload truncated");
                UploadedFile::new(client_name, declared_type, 0, PathBuf::new())
                    .with_error(UploadError::Partial)
            }
        };

        tracing::debug!(field = %field_name, size = file.size(), "upload received");
        files.insert(&field_name, file);
    }

    files
}

fn temp_path_in(dir: &std::path::Path) -> PathBuf {
    dir.join(format!("syme-{}", Uuid::now_v7()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syme_core::UploadEntry;
    use tempfile::TempDir;

    fn create_multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> Bytes {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{boundary}\r\n"));
            match filename {
                Some(filename) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    ));
                    body.push_str("Content-Type: text/plain\r\n");
                }
                None => {
                    body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n"));
                }
            }
            body.push_str("\r\n");
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Bytes::from(body)
    }

    #[tokio::test]
    async fn test_spool_single_and_array_fields() {
        let dir = TempDir::new().unwrap();
        let body = create_multipart_body(
            "XyZ",
            &[
                ("avatar", Some("me.txt"), "hello"),
                ("docs[]", Some("a.txt"), "aaa"),
                ("docs[]", Some("b.txt"), "bb"),
                ("title", None, "ignored"),
            ],
        );

        let files = spool_uploads(body, "XyZ".into(), dir.path()).await;

        assert!(files.has_file("avatar"));
        assert!(files.has_file("docs"));
        assert!(!files.has_file("title"));
        assert_eq!(files.count(), 3);

        match files.get("avatar") {
            Some(UploadEntry::Single(file)) => {
                assert_eq!(file.name(), "me.txt");
                assert_eq!(file.declared_type(), "text/plain");
                assert_eq!(file.size(), 5);
                assert_eq!(std::fs::read_to_string(file.temp_path()).unwrap(), "hello");
                assert!(file.temp_path().starts_with(dir.path()));
            }
            other => panic!("unexpected entry {other:?}"),
        }

        match files.get("docs") {
            Some(UploadEntry::Many(list)) => {
                let names: Vec<&str> = list.iter().map(|f| f.name()).collect();
                assert_eq!(names, ["a.txt", "b.txt"]);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_multipart_has_no_files() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/app/form")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();

        let mut config = SymeConfig::default();
        config.application.root_path = "/app".into();
        let transport = from_parts(parts, Bytes::from_static(b"a=1"), None, &config).await;

        assert_eq!(transport.root_path, "/app");
        assert_eq!(transport.scheme, "http");
        assert_eq!(transport.files.count(), 0);
        assert_eq!(transport.body, Bytes::from_static(b"a=1"));
    }

    #[test]
    fn test_multipart_boundary_detection() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=abc".parse().unwrap(),
        );
        assert_eq!(multipart_boundary(&headers).as_deref(), Some("abc"));

        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(multipart_boundary(&headers).is_none());
    }
}
