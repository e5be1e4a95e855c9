//! Result types returned by the recognition entry points.

use serde::{Deserialize, Serialize};

/// Text extracted by OCR.
///
/// `text` has already been through [`crate::pipeline::postprocess::clean_text`];
/// it is empty when the engine found nothing, which is a valid result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    /// The engine's own quality score, 0–100.
    pub confidence: f32,
}

impl OcrResult {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Payload decoded from a QR code. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrResult {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_result_serde() {
        let r = OcrResult {
            text: "Invoice 42".into(),
            confidence: 87.5,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"text":"Invoice 42","confidence":87.5}"#);
        let back: OcrResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn empty_ocr_text_is_still_a_result() {
        let r = OcrResult {
            text: String::new(),
            confidence: 0.0,
        };
        assert!(r.is_empty());
    }
}
