//! # Attachments
//!
//! Pending files and their conversion into self-contained `file` parts.
//!
//! Files are read and base64-encoded in fixed-size chunks, so a 10 MB
//! attachment never needs its raw bytes and its encoded form in memory
//! at the same time.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use tokio::io::AsyncReadExt;

use crate::core::config::Limits;
use crate::inference::Part;
use crate::inference::data_url;

/// Media types the file picker accepts.
pub const PICKER_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

/// Read size for streaming encode. A multiple of 3 so chunks encode without padding.
const ENCODE_CHUNK: usize = 48 * 1024;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    Path(PathBuf),
    /// In-memory bytes, e.g. an image pasted from the clipboard.
    Bytes(Arc<[u8]>),
}

/// A file the user picked or pasted, not yet encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub source: AttachmentSource,
    identity: String,
}

impl Attachment {
    /// Builds an attachment from a file on disk. Only metadata is read here.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let metadata = std::fs::metadata(path).map_err(|e| AttachmentError::Io {
            name: name.clone(),
            message: e.to_string(),
        })?;
        if !metadata.is_file() {
            return Err(AttachmentError::Io {
                name,
                message: "not a regular file".to_string(),
            });
        }
        let identity = std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        Ok(Self {
            media_type: media_type_for_path(path).to_string(),
            name,
            size: metadata.len(),
            source: AttachmentSource::Path(path.to_path_buf()),
            identity,
        })
    }

    /// Wraps in-memory bytes. Every call yields a distinct identity.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            source: AttachmentSource::Bytes(bytes.into()),
            identity: format!("memory:{}", uuid::Uuid::new_v4()),
        }
    }

    /// An image captured from the system clipboard, already encoded as PNG.
    pub fn from_clipboard_png(png: Vec<u8>) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        Self::from_bytes(format!("pasted-{stamp}.png"), "image/png", png)
    }

    /// Deduplication key: the canonical path, or a unique id for in-memory bytes.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn kind(&self) -> FileKind {
        file_kind(&self.name, Some(&self.media_type))
    }

    /// Size in MB with one decimal, e.g. `"3.2MB"`.
    pub fn size_label(&self) -> String {
        format_size_mb(self.size)
    }
}

pub fn format_size_mb(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / BYTES_PER_MB)
}

/// Guesses a media type from the file extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// How a file part is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
    Text,
    Unknown,
}

impl FileKind {
    pub fn label(self) -> &'static str {
        match self {
            FileKind::Image => "Image",
            FileKind::Pdf => "PDF Document",
            FileKind::Text => "Text document",
            FileKind::Unknown => "File",
        }
    }
}

/// Resolves the kind from the media type first, then from the extension.
pub fn file_kind(filename: &str, media_type: Option<&str>) -> FileKind {
    if let Some(mt) = media_type {
        if mt.starts_with("image/") {
            return FileKind::Image;
        }
        if mt == "application/pdf" {
            return FileKind::Pdf;
        }
        if mt.starts_with("text/") {
            return FileKind::Text;
        }
    }

    let extension = filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => FileKind::Pdf,
        "jpg" | "jpeg" | "png" | "gif" | "webp" => FileKind::Image,
        "txt" | "md" | "json" | "csv" => FileKind::Text,
        _ => FileKind::Unknown,
    }
}

pub fn is_picker_type(media_type: &str) -> bool {
    PICKER_MEDIA_TYPES.contains(&media_type)
}

/// Paste accepts any image type.
pub fn is_pasteable_type(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

// ============================================================================
// Errors
// ============================================================================

/// Attachment rejections. `Display` is the toast the user sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    TooManyFiles { max: usize },
    FileTooLarge { name: String, max_mb: u64 },
    UnsupportedType { name: String, media_type: String },
    Io { name: String, message: String },
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentError::TooManyFiles { max } => {
                write!(f, "You can select a maximum of {max} files.")
            }
            AttachmentError::FileTooLarge { name, max_mb } => {
                write!(f, "The file \"{name}\" exceeds the maximum size of {max_mb}MB.")
            }
            AttachmentError::UnsupportedType { name, media_type } => {
                write!(f, "The file \"{name}\" has an unsupported type ({media_type}).")
            }
            AttachmentError::Io { name, message } => {
                write!(f, "The file \"{name}\" could not be read: {message}")
            }
        }
    }
}

impl std::error::Error for AttachmentError {}

// ============================================================================
// Validation + Encoding
// ============================================================================

/// Checks a whole batch against the limits. The first violation wins.
pub fn validate_batch<'a>(
    batch: impl IntoIterator<Item = &'a Attachment>,
    limits: &Limits,
) -> Result<(), AttachmentError> {
    let batch: Vec<&Attachment> = batch.into_iter().collect();
    if batch.len() > limits.max_files {
        return Err(AttachmentError::TooManyFiles {
            max: limits.max_files,
        });
    }
    if let Some(large) = batch.iter().find(|a| a.size > limits.max_file_size_bytes) {
        return Err(AttachmentError::FileTooLarge {
            name: large.name.clone(),
            max_mb: limits.max_file_size_mb(),
        });
    }
    Ok(())
}

/// Encodes attachments into `file` parts, preserving order.
///
/// The batch is validated up front; any failure rejects all of it.
pub async fn encode_attachments(
    attachments: &[Attachment],
    limits: &Limits,
) -> Result<Vec<Part>, AttachmentError> {
    validate_batch(attachments, limits)?;

    let mut parts = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let url = match &attachment.source {
            AttachmentSource::Bytes(bytes) => data_url::from_bytes(&attachment.media_type, bytes),
            AttachmentSource::Path(path) => encode_file(attachment, path, limits).await?,
        };
        debug!(
            "Encoded {} ({}, {} bytes) into {} chars",
            attachment.name,
            attachment.media_type,
            attachment.size,
            url.len()
        );
        parts.push(Part::File {
            media_type: attachment.media_type.clone(),
            filename: attachment.name.clone(),
            url,
        });
    }
    info!("Encoded {} attachment(s)", parts.len());
    Ok(parts)
}

/// Streams a file into a base64 data URL.
///
/// The size is re-checked while reading since the file may have grown
/// after it was attached.
async fn encode_file(
    attachment: &Attachment,
    path: &Path,
    limits: &Limits,
) -> Result<String, AttachmentError> {
    let io_err = |e: std::io::Error| AttachmentError::Io {
        name: attachment.name.clone(),
        message: e.to_string(),
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let encoded_len = (attachment.size as usize).div_ceil(3) * 4;
    let mut url = data_url::header(&attachment.media_type);
    url.reserve(encoded_len);

    let mut buf = vec![0u8; ENCODE_CHUNK];
    let mut total: u64 = 0;
    loop {
        let filled = fill(&mut file, &mut buf).await.map_err(io_err)?;
        if filled == 0 {
            break;
        }
        total += filled as u64;
        if total > limits.max_file_size_bytes {
            return Err(AttachmentError::FileTooLarge {
                name: attachment.name.clone(),
                max_mb: limits.max_file_size_mb(),
            });
        }
        STANDARD.encode_string(&buf[..filled], &mut url);
        if filled < buf.len() {
            break;
        }
    }
    Ok(url)
}

/// Reads until `buf` is full or the file ends. Returns the bytes read.
async fn fill(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::data_url::DataUrl;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    fn sized(name: &str, size: u64) -> Attachment {
        Attachment {
            name: name.to_string(),
            media_type: "image/png".to_string(),
            size,
            source: AttachmentSource::Bytes(Arc::from(Vec::new())),
            identity: name.to_string(),
        }
    }

    #[test]
    fn test_file_kind_prefers_media_type() {
        assert_eq!(file_kind("a.bin", Some("image/webp")), FileKind::Image);
        assert_eq!(file_kind("a.txt", Some("application/pdf")), FileKind::Pdf);
        assert_eq!(file_kind("a", Some("text/csv")), FileKind::Text);
    }

    #[test]
    fn test_file_kind_falls_back_to_extension() {
        assert_eq!(file_kind("Report.PDF", None), FileKind::Pdf);
        assert_eq!(file_kind("photo.jpeg", Some("application/octet-stream")), FileKind::Image);
        assert_eq!(file_kind("data.json", Some("application/json")), FileKind::Text);
        assert_eq!(file_kind("archive.zip", None), FileKind::Unknown);
        assert_eq!(file_kind("noext", None), FileKind::Unknown);
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("doc.pdf")), "application/pdf");
        assert_eq!(media_type_for_path(Path::new("x")), "application/octet-stream");
    }

    #[test]
    fn test_error_messages_match_toasts() {
        assert_eq!(
            AttachmentError::TooManyFiles { max: 5 }.to_string(),
            "You can select a maximum of 5 files."
        );
        assert_eq!(
            AttachmentError::FileTooLarge {
                name: "big.pdf".to_string(),
                max_mb: 10
            }
            .to_string(),
            "The file \"big.pdf\" exceeds the maximum size of 10MB."
        );
    }

    #[test]
    fn test_validate_batch_limits() {
        let limits = Limits::default();
        let mb = 1024 * 1024;
        let ok: Vec<Attachment> = (0..5).map(|i| sized(&format!("{i}.png"), 3 * mb)).collect();
        assert!(validate_batch(&ok, &limits).is_ok());

        let six: Vec<Attachment> = (0..6).map(|i| sized(&format!("{i}.png"), 3 * mb)).collect();
        assert_eq!(
            validate_batch(&six, &limits),
            Err(AttachmentError::TooManyFiles { max: 5 })
        );

        let big = vec![sized("a.png", mb), sized("huge.png", 10 * mb + 1)];
        assert!(matches!(
            validate_batch(&big, &limits),
            Err(AttachmentError::FileTooLarge { ref name, .. }) if name == "huge.png"
        ));

        let exact = vec![sized("edge.png", 10 * mb)];
        assert!(validate_batch(&exact, &limits).is_ok());
    }

    #[test]
    fn test_size_label() {
        assert_eq!(format_size_mb(3 * 1024 * 1024 + 200 * 1024), "3.2MB");
        assert_eq!(format_size_mb(0), "0.0MB");
    }

    #[test]
    fn test_from_path_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "cat.png", b"png-bytes");
        let attachment = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.name, "cat.png");
        assert_eq!(attachment.media_type, "image/png");
        assert_eq!(attachment.size, 9);
        assert_eq!(attachment.kind(), FileKind::Image);

        let again = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.identity(), again.identity());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = Attachment::from_path("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, AttachmentError::Io { ref name, .. } if name == "here.png"));
    }

    #[test]
    fn test_clipboard_attachments_are_distinct() {
        let a = Attachment::from_clipboard_png(vec![1, 2, 3]);
        let b = Attachment::from_clipboard_png(vec![1, 2, 3]);
        assert_ne!(a.identity(), b.identity());
        assert_eq!(a.media_type, "image/png");
        assert!(a.name.starts_with("pasted-"));
    }

    #[tokio::test]
    async fn test_encode_preserves_order_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        // Larger than one chunk and not a multiple of 3.
        let big: Vec<u8> = (0..(ENCODE_CHUNK * 2 + 7)).map(|i| (i % 251) as u8).collect();
        let first = Attachment::from_path(write_file(&dir, "first.pdf", &big)).unwrap();
        let second = Attachment::from_bytes("second.txt", "text/plain", b"hello".to_vec());

        let parts = encode_attachments(&[first, second], &Limits::default())
            .await
            .unwrap();

        assert_eq!(parts.len(), 2);
        let Part::File { media_type, filename, url } = &parts[0] else {
            panic!("expected file part");
        };
        assert_eq!(media_type, "application/pdf");
        assert_eq!(filename, "first.pdf");
        assert_eq!(DataUrl::parse(url).unwrap().bytes().unwrap(), big);

        let Part::File { filename, url, .. } = &parts[1] else {
            panic!("expected file part");
        };
        assert_eq!(filename, "second.txt");
        assert_eq!(url, "data:text/plain;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn test_encode_rejects_whole_batch() {
        let limits = Limits {
            max_files: 1,
            ..Limits::default()
        };
        let a = Attachment::from_bytes("a.png", "image/png", vec![0]);
        let b = Attachment::from_bytes("b.png", "image/png", vec![0]);
        let err = encode_attachments(&[a, b], &limits).await.unwrap_err();
        assert_eq!(err, AttachmentError::TooManyFiles { max: 1 });
    }

    #[tokio::test]
    async fn test_encode_detects_growth_after_attach() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "grow.txt", b"ab");
        let attachment = Attachment::from_path(&path).unwrap();
        std::fs::write(&path, vec![b'x'; 64]).unwrap();

        let limits = Limits {
            max_file_size_bytes: 16,
            ..Limits::default()
        };
        let err = encode_attachments(&[attachment], &limits).await.unwrap_err();
        assert!(matches!(err, AttachmentError::FileTooLarge { .. }));
    }

    #[test]
    fn test_encode_empty_batch() {
        let parts = tokio_test::block_on(encode_attachments(&[], &Limits::default()));
        assert!(tokio_test::assert_ok!(parts).is_empty());
    }
}
