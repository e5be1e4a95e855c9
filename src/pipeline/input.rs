//! Input resolution: turn a data URL, file path or byte buffer into an
//! [`EncodedImage`].
//!
//! Web pickers hand images over as `data:<mime>;base64,<payload>` strings,
//! the CLI hands over paths, and library callers often already hold bytes.
//! All three end up as the same immutable, MIME-tagged buffer. Anything whose
//! MIME type is not `image/*` is rejected here with `InvalidInput`, before a
//! decoder ever sees it.

use crate::error::ProcessingError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Encoded image bytes plus their MIME type. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    /// Wrap bytes with an explicit MIME type.
    ///
    /// Fails with `InvalidInput` when the MIME type is not `image/*` or the
    /// buffer is empty.
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Result<Self, ProcessingError> {
        let bytes = bytes.into();
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(ProcessingError::invalid_input(format!(
                "Selected file is not an image (type '{mime_type}')"
            )));
        }
        if bytes.is_empty() {
            return Err(ProcessingError::invalid_input("Image data is empty"));
        }
        Ok(Self {
            bytes: bytes.into(),
            mime_type,
        })
    }

    /// Wrap bytes, sniffing the MIME type from the magic number.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, ProcessingError> {
        let bytes = bytes.into();
        let format = image::guess_format(&bytes).map_err(|_| {
            ProcessingError::invalid_input("Selected file is not an image")
        })?;
        Self::new(bytes, format.to_mime_type())
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(data_url: &str) -> Result<Self, ProcessingError> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| ProcessingError::invalid_input("Expected a data URL starting with 'data:'"))?;

        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            ProcessingError::invalid_input("Invalid image format. Data URL has no payload.")
        })?;

        let mut params = header.split(';');
        let mime = params.next().unwrap_or_default();
        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(ProcessingError::invalid_input(
                "Invalid image format. Only base64 data URLs are supported.",
            ));
        }

        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = STANDARD.decode(compact.as_bytes()).map_err(|e| {
            ProcessingError::invalid_input(format!(
                "Invalid image format. Please upload a valid image file. ({e})"
            ))
        })?;

        debug!("Parsed data URL: {} ({} bytes)", mime, bytes.len());
        Self::new(bytes, mime)
    }

    /// Render as a base64 data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a data URL.
pub fn is_data_url(input: &str) -> bool {
    input.trim_start().starts_with("data:")
}

/// Resolve a CLI-style input (data URL or file path) to an [`EncodedImage`].
pub async fn resolve_input(input: &str) -> Result<EncodedImage, ProcessingError> {
    if is_data_url(input) {
        EncodedImage::from_data_url(input)
    } else {
        read_file(Path::new(input)).await
    }
}

/// Read an image file from disk.
pub async fn read_file(path: &Path) -> Result<EncodedImage, ProcessingError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ProcessingError::invalid_input(format!("Failed to read '{}': {e}", path.display()))
    })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    EncodedImage::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn test_is_data_url() {
        assert!(is_data_url("data:image/png;base64,AAAA"));
        assert!(is_data_url("  data:image/png;base64,AAAA"));
        assert!(!is_data_url("/tmp/photo.png"));
        assert!(!is_data_url(""));
    }

    #[test]
    fn data_url_round_trip() {
        let img = EncodedImage::new(PNG_MAGIC.to_vec(), "image/png").unwrap();
        let url = img.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        let back = EncodedImage::from_data_url(&url).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn data_url_with_non_image_mime_is_invalid_input() {
        let err = EncodedImage::from_data_url("data:text/plain;base64,aGVsbG8=").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("not an image"));
    }

    #[test]
    fn data_url_without_base64_marker_is_rejected() {
        let err = EncodedImage::from_data_url("data:image/png,rawdata").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn data_url_with_bad_base64_is_rejected() {
        let err = EncodedImage::from_data_url("data:image/png;base64,!!!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn data_url_payload_may_contain_line_breaks() {
        let img = EncodedImage::from_data_url("data:image/jpeg;base64,/9j/\n4AAQ").unwrap();
        assert_eq!(img.mime_type(), "image/jpeg");
        assert_eq!(img.len(), 6);
    }

    #[test]
    fn from_bytes_sniffs_png() {
        let img = EncodedImage::from_bytes(PNG_MAGIC.to_vec()).unwrap();
        assert_eq!(img.mime_type(), "image/png");
    }

    #[test]
    fn from_bytes_rejects_text() {
        let err = EncodedImage::from_bytes(b"hello world".to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn empty_bytes_are_rejected() {
        let err = EncodedImage::new(Vec::new(), "image/png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn missing_file_is_invalid_input() {
        let err = resolve_input("/definitely/not/here.png").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
