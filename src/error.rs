//! Error types for the pixread library.
//!
//! Every operation ends in exactly one of two outcomes: a populated result or
//! one [`ProcessingError`]. The five variants are the whole taxonomy; failures
//! from the image decoder, the OCR engine, the QR decoder or the blocking
//! thread pool are all mapped onto one of them at the pipeline boundary.
//!
//! * [`ProcessingError::InvalidInput`]: the caller handed us something that
//!   is not an image (or empty text for QR generation).
//! * [`ProcessingError::DecodeFailure`]: the bytes claim to be an image but
//!   do not parse as one.
//! * [`ProcessingError::Timeout`]: a stage exceeded its time bound.
//! * [`ProcessingError::EngineFailure`]: the recognition engine broke in a
//!   way we did not expect.
//! * [`ProcessingError::NotFound`]: the QR decoder ran cleanly and found
//!   nothing. This is an ordinary outcome, not a fault.
//!
//! "No text detected" is *not* an error: OCR returns `text == ""`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// All errors returned by the pixread library.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// Not an image, malformed data URL, empty QR text, bad configuration.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The bytes do not decode as a supported image.
    #[error("Failed to decode image: {message}")]
    DecodeFailure { message: String },

    /// A stage ran past its configured bound.
    #[error("{stage} timed out after {}ms. The image may be too large or complex.", .limit.as_millis())]
    Timeout { stage: TimeoutStage, limit: Duration },

    /// The recognition engine raised an unexpected internal error.
    #[error("{engine} failed: {detail}")]
    EngineFailure { engine: String, detail: String },

    /// The QR decoder completed without finding a readable code.
    #[error("{message}")]
    NotFound { message: String },
}

impl ProcessingError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn decode_failure(message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            message: message.into(),
        }
    }

    pub fn engine_failure(engine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::EngineFailure {
            engine: engine.into(),
            detail: detail.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// The variant without its payload, for matching and serialisation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::EngineFailure { .. } => ErrorKind::EngineFailure,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// `NotFound` is an expected outcome that callers usually show as
    /// "nothing here" rather than as a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Payload-free discriminant of [`ProcessingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    DecodeFailure,
    Timeout,
    EngineFailure,
    NotFound,
}

/// Which bound expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutStage {
    /// The whole OCR attempt (decode, normalise, engine).
    OcrAttempt,
    /// The whole QR attempt.
    QrAttempt,
    /// Image decoding inside the QR attempt.
    ImageDecode,
}

impl fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutStage::OcrAttempt => "OCR processing",
            TimeoutStage::QrAttempt => "QR processing",
            TimeoutStage::ImageDecode => "Image loading",
        };
        f.write_str(s)
    }
}

impl From<image::ImageError> for ProcessingError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(u) => {
                ProcessingError::decode_failure(format!("unsupported image: {u}"))
            }
            other => ProcessingError::decode_failure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_stage_and_limit() {
        let e = ProcessingError::Timeout {
            stage: TimeoutStage::QrAttempt,
            limit: Duration::from_secs(10),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("QR processing timed out"), "got: {msg}");
        assert!(msg.contains("10000ms"), "got: {msg}");
    }

    #[test]
    fn not_found_display_is_the_message() {
        let e = ProcessingError::not_found("No QR code found in the image.");
        assert_eq!(e.to_string(), "No QR code found in the image.");
        assert!(e.is_not_found());
    }

    #[test]
    fn engine_failure_display() {
        let e = ProcessingError::engine_failure("tesseract", "exit status 1");
        assert_eq!(e.to_string(), "tesseract failed: exit status 1");
        assert_eq!(e.kind(), ErrorKind::EngineFailure);
    }

    #[test]
    fn kind_serialises_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DecodeFailure).unwrap();
        assert_eq!(json, "\"decode_failure\"");
    }

    #[test]
    fn image_error_maps_to_decode_failure() {
        let err = image::load_from_memory(b"definitely not an image").unwrap_err();
        let e: ProcessingError = err.into();
        assert_eq!(e.kind(), ErrorKind::DecodeFailure);
    }
}
