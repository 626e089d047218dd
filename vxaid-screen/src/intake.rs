//! Image intake
//!
//! Validates a picked or dropped file against the accepted image types and
//! turns it into a [`SelectedImage`] carrying a data-URI preview. Encoding the
//! preview is the only suspension point; callers see nothing until it is done.

use base64::{engine::general_purpose, Engine as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// MIME types accepted for upload
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

/// Shown when a file of another type is offered
pub const REJECTION_MESSAGE: &str = "Only JPG / PNG allowed.";

/// Image intake errors
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Only JPG / PNG allowed.")]
    UnsupportedType {
        filename: String,
        mime_type: Option<String>,
    },

    #[error("No image selected")]
    Missing,

    #[error("Image is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Preview encoding failed: {0}")]
    Preview(String),
}

impl IntakeError {
    /// Text shown to the user for this rejection
    pub fn user_message(&self) -> String {
        match self {
            IntakeError::UnsupportedType { .. } => REJECTION_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// A file offered for upload, before validation
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    filename: String,
    declared_mime: Option<String>,
    bytes: Vec<u8>,
}

impl ImageCandidate {
    /// Candidate from in-memory content with an optional declared MIME type
    pub fn from_bytes(
        filename: impl Into<String>,
        declared_mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            declared_mime,
            bytes,
        }
    }

    /// Read a candidate from disk
    ///
    /// The MIME type comes from the file extension; files without a known
    /// extension are sniffed by content.
    pub async fn from_path(path: &Path) -> Result<Self, IntakeError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| IntakeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let declared_mime = mime_from_extension(path)
            .or_else(|| sniff_mime(&bytes))
            .map(str::to_string);

        debug!(
            filename = %filename,
            mime = ?declared_mime,
            size = bytes.len(),
            "Read image candidate"
        );

        Ok(Self {
            filename,
            declared_mime,
            bytes,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A validated image with its preview
///
/// `preview` is present exactly when the file passed validation and encoding
/// finished, which is the only way to construct this type.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedImage {
    filename: String,
    mime_type: String,
    bytes: Arc<Vec<u8>>,
    preview: String,
}

impl SelectedImage {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw file content as uploaded
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `data:<mime>;base64,<content>` suitable for display and report payloads
    pub fn preview_data_uri(&self) -> &str {
        &self.preview
    }
}

/// Check a candidate against the accepted types and the size limit
///
/// Returns the MIME type the file will be uploaded with.
pub fn validate(candidate: &ImageCandidate, max_upload_bytes: u64) -> Result<String, IntakeError> {
    if candidate.is_empty() {
        return Err(IntakeError::Missing);
    }

    let mime = candidate
        .declared_mime()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| is_accepted(m))
        .ok_or_else(|| IntakeError::UnsupportedType {
            filename: candidate.filename.clone(),
            mime_type: candidate.declared_mime.clone(),
        })?;

    let size = candidate.len() as u64;
    if size > max_upload_bytes {
        return Err(IntakeError::TooLarge {
            size,
            limit: max_upload_bytes,
        });
    }

    Ok(mime)
}

/// Encode the preview for an already validated candidate
pub async fn decode_preview(
    candidate: ImageCandidate,
    mime_type: String,
) -> Result<SelectedImage, IntakeError> {
    let ImageCandidate {
        filename, bytes, ..
    } = candidate;

    tokio::task::spawn_blocking(move || {
        let preview = data_uri(&mime_type, &bytes);
        SelectedImage {
            filename,
            mime_type,
            bytes: Arc::new(bytes),
            preview,
        }
    })
    .await
    .map_err(|e| IntakeError::Preview(e.to_string()))
}

/// Validate and encode in one step
pub async fn accept(
    candidate: ImageCandidate,
    max_upload_bytes: u64,
) -> Result<SelectedImage, IntakeError> {
    let mime = validate(&candidate, max_upload_bytes)?;
    decode_preview(candidate, mime).await
}

/// Whether `mime` is one of [`ACCEPTED_MIME_TYPES`]
pub fn is_accepted(mime: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&mime)
}

/// Build a base64 data URI
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// MIME type a browser would declare for this file name
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" | "jpe" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 24]);
        bytes
    }

    #[test]
    fn test_accepted_types() {
        for mime in ["image/jpeg", "image/png", "image/jpg"] {
            let candidate =
                ImageCandidate::from_bytes("eye", Some(mime.to_string()), vec![1, 2, 3]);
            assert_eq!(validate(&candidate, 1024).unwrap(), mime);
        }
    }

    #[test]
    fn test_rejected_types() {
        for mime in [Some("image/gif"), Some("application/pdf"), Some(""), None] {
            let candidate =
                ImageCandidate::from_bytes("eye", mime.map(str::to_string), vec![1, 2, 3]);
            let err = validate(&candidate, 1024).unwrap_err();
            assert!(matches!(err, IntakeError::UnsupportedType { .. }));
            assert_eq!(err.user_message(), REJECTION_MESSAGE);
        }
    }

    #[test]
    fn test_declared_mime_is_normalized() {
        let candidate =
            ImageCandidate::from_bytes("eye.PNG", Some(" Image/PNG ".to_string()), vec![1]);
        assert_eq!(validate(&candidate, 1024).unwrap(), "image/png");
    }

    #[test]
    fn test_empty_file_is_missing() {
        let candidate = ImageCandidate::from_bytes("eye.png", Some("image/png".into()), vec![]);
        assert!(matches!(validate(&candidate, 1024), Err(IntakeError::Missing)));
    }

    #[test]
    fn test_size_limit() {
        let candidate =
            ImageCandidate::from_bytes("eye.png", Some("image/png".into()), vec![0; 11]);
        match validate(&candidate, 10) {
            Err(IntakeError::TooLarge { size, limit }) => {
                assert_eq!(size, 11);
                assert_eq!(limit, 10);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_accept_produces_preview() {
        let candidate =
            ImageCandidate::from_bytes("fundus.png", Some("image/png".into()), png_bytes());
        let image = accept(candidate, 1024).await.unwrap();

        assert_eq!(image.filename(), "fundus.png");
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.size_bytes(), 32);
        assert!(image.preview_data_uri().starts_with("data:image/png;base64,"));
        assert!(image.preview_data_uri().len() > "data:image/png;base64,".len());
    }

    #[tokio::test]
    async fn test_from_path_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retina.JPG");
        std::fs::write(&path, JPEG_MAGIC).unwrap();

        let candidate = ImageCandidate::from_path(&path).await.unwrap();
        assert_eq!(candidate.filename(), "retina.JPG");
        assert_eq!(candidate.declared_mime(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_from_path_sniffs_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retina");
        std::fs::write(&path, png_bytes()).unwrap();

        let candidate = ImageCandidate::from_path(&path).await.unwrap();
        assert_eq!(candidate.declared_mime(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_from_path_trusts_extension_over_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, png_bytes()).unwrap();

        let candidate = ImageCandidate::from_path(&path).await.unwrap();
        assert_eq!(candidate.declared_mime(), Some("text/plain"));
        assert!(validate(&candidate, 1024).is_err());
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageCandidate::from_path(&dir.path().join("nope.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Io { .. }));
    }
}
