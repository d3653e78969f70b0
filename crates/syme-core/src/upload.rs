//! Files received through a multipart request body.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

const SIZE_UNITS: [&str; 6] = ["o", "Ko", "Mo", "Go", "To", "Po"];

/// Why an upload is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// The file exceeds the server-side size limit.
    TooLarge,
    /// The body ended before the file was complete.
    Partial,
    /// The field carried no file.
    NoFile,
    /// The temporary copy could not be written.
    CantWrite,
}

impl UploadError {
    /// Numeric code, compatible with the usual upload error numbering.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::TooLarge => 1,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::CantWrite => 7,
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::TooLarge => "file exceeds the size limit",
            Self::Partial => "file was only partially received",
            Self::NoFile => "no file was sent",
            Self::CantWrite => "file could not be written to disk",
        };
        f.write_str(text)
    }
}

/// One uploaded file spooled to temporary storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    name: String,
    declared_type: String,
    size: u64,
    temp_path: PathBuf,
    error: Option<UploadError>,
}

impl UploadedFile {
    /// Describes a file already written to `temp_path`.
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        size: u64,
        temp_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            size,
            temp_path: temp_path.into(),
            error: None,
        }
    }

    /// Marks the upload as failed.
    #[must_use]
    pub fn with_error(mut self, error: UploadError) -> Self {
        self.error = Some(error);
        self
    }

    /// Client-supplied file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased extension of the client file name, empty if none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// MIME type declared by the client.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// Size in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Size with a binary unit, e.g. `1.5Ko`.
    pub fn readable_size(&self) -> String {
        if self.size == 0 {
            return "0.00o".to_string();
        }
        let mut value = self.size as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        let rounded = (value * 100.0).round() / 100.0;
        format!("{rounded}{}", SIZE_UNITS[unit])
    }

    /// Location of the temporary copy.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// MIME type sniffed from the leading bytes of the temporary copy.
    ///
    /// Returns `None` when the file cannot be read.
    pub fn content_type(&self) -> Option<&'static str> {
        let mut head = [0_u8; 512];
        let mut file = fs::File::open(&self.temp_path).ok()?;
        let read = file.read(&mut head).ok()?;
        Some(sniff(&head[..read]))
    }

    /// The upload failure, if any.
    pub const fn error(&self) -> Option<UploadError> {
        self.error
    }

    /// Numeric error code, `0` when the upload succeeded.
    pub fn error_code(&self) -> u8 {
        self.error.map_or(0, UploadError::code)
    }

    /// Returns true if the upload failed.
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Moves the temporary copy into `directory`, under `file_name` or the
    /// client file name. Returns the final path.
    ///
    /// Only the last component of either name is used.
    pub fn move_to(&self, directory: impl AsRef<Path>, file_name: Option<&str>) -> io::Result<PathBuf> {
        let requested = file_name.unwrap_or(&self.name);
        let base = Path::new(requested)
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty file name"))?;
        let target = directory.as_ref().join(base);

        if fs::rename(&self.temp_path, &target).is_err() {
            // Cross-device moves need a copy.
            fs::copy(&self.temp_path, &target)?;
            fs::remove_file(&self.temp_path)?;
        }
        tracing::debug!(from = %self.temp_path.display(), to = %target.display(), "upload moved");
        Ok(target)
    }
}

impl fmt::Display for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.name,
            self.readable_size(),
            self.content_type().unwrap_or("unknown type")
        )
    }
}

fn sniff(head: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"BM", "image/bmp"),
        (b"\x00asm", "application/wasm"),
    ];

    if head.is_empty() {
        return "application/x-empty";
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp";
    }
    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| head.starts_with(magic)) {
        return mime;
    }
    if std::str::from_utf8(head).is_ok() {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

/// A form field's files: a single input, or an array-style `name[]` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEntry {
    /// `<input type="file" name="avatar">`
    Single(UploadedFile),
    /// `<input type="file" name="photos[]" multiple>`
    Many(Vec<UploadedFile>),
}

impl UploadEntry {
    /// The single file, or the first of many.
    pub fn first(&self) -> Option<&UploadedFile> {
        match self {
            Self::Single(file) => Some(file),
            Self::Many(files) => files.first(),
        }
    }

    /// Number of files in this entry.
    pub fn count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(files) => files.len(),
        }
    }
}

/// Uploaded files keyed by form field name, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedFiles {
    entries: IndexMap<String, UploadEntry>,
}

impl UploadedFiles {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file received under form field `field`.
    ///
    /// A field ending in `[]` groups its files into one [`UploadEntry::Many`].
    /// Files with a blank client name are skipped, though an array field is
    /// still recorded.
    pub fn insert(&mut self, field: &str, file: UploadedFile) {
        let keep = !file.name.trim().is_empty();

        if let Some(base) = field.strip_suffix("[]") {
            let entry = self
                .entries
                .entry(base.to_string())
                .or_insert_with(|| UploadEntry::Many(Vec::new()));
            if keep {
                match entry {
                    UploadEntry::Many(files) => files.push(file),
                    UploadEntry::Single(_) => *entry = UploadEntry::Many(vec![file]),
                }
            }
        } else if keep {
            self.entries.insert(field.to_string(), UploadEntry::Single(file));
        }
    }

    /// Returns true if field `name` carried files.
    pub fn has_file(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The entry for field `name`.
    pub fn get(&self, name: &str) -> Option<&UploadEntry> {
        self.entries.get(name)
    }

    /// Iterates fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UploadEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of files, counting inside array fields.
    pub fn count(&self) -> usize {
        self.entries.values().map(UploadEntry::count).sum()
    }

    /// Returns true if no field carried files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for UploadedFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "files received: {}", self.count())
    }
}
