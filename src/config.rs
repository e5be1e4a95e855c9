//! Configuration types for text and QR recognition.
//!
//! All pipeline behaviour is controlled through [`RecognitionConfig`], built
//! via its [`RecognitionConfigBuilder`]. The defaults reproduce the tuned
//! values the photo tools ship with: 1500 px for OCR, 1024 px for QR,
//! threshold 140, 300 DPI, and 30 s / 10 s / 2 s time bounds.

use crate::error::ProcessingError;
use crate::pipeline::ocr::OcrEngineFactory;
use crate::pipeline::orientation::Orientation;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one recognition call.
///
/// Cheap to clone: the engine factory and callback are shared `Arc`s.
///
/// # Example
/// ```rust
/// use pixread::RecognitionConfig;
/// use std::time::Duration;
///
/// let config = RecognitionConfig::builder()
///     .language("eng+deu")
///     .ocr_timeout(Duration::from_secs(45))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RecognitionConfig {
    /// Longest edge of the OCR input after downscaling. Default: 1500.
    ///
    /// Larger inputs blow up engine memory on phones without improving
    /// accuracy on typical document photos.
    pub ocr_max_edge: u32,

    /// Longest edge of the QR input after downscaling. Default: 1024.
    pub qr_max_edge: u32,

    /// Binarisation threshold on the RGB average. Default: 140.
    ///
    /// Pixels strictly above the threshold become white, the rest black.
    pub threshold: u8,

    /// Engine language code(s), e.g. `"eng"` or `"eng+fra"`. Default: `"eng"`.
    pub language: String,

    /// Engine mode passed to the OCR engine (`1` = LSTM only). Default: 1.
    pub engine_mode: u8,

    /// Resolution hint for the OCR engine. Default: 300.
    pub dpi: u32,

    /// Page segmentation mode (`3` = fully automatic). Default: 3.
    pub page_seg_mode: u8,

    /// Bound on a whole OCR attempt. Default: 30 s.
    pub ocr_timeout: Duration,

    /// Bound on a whole QR attempt. Default: 10 s.
    pub qr_timeout: Duration,

    /// Bound on image decoding inside a QR attempt. Default: 2 s.
    pub decode_timeout: Duration,

    /// Force an orientation instead of reading EXIF. Default: None.
    pub orientation: Option<Orientation>,

    /// Path to the `tesseract` executable. Default: None (`TESSERACT_BIN`, then `PATH`).
    pub tesseract_path: Option<PathBuf>,

    /// Pre-constructed engine factory. Takes precedence over `tesseract_path`.
    pub engine_factory: Option<Arc<dyn OcrEngineFactory>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            ocr_max_edge: 1500,
            qr_max_edge: 1024,
            threshold: 140,
            language: "eng".to_string(),
            engine_mode: 1,
            dpi: 300,
            page_seg_mode: 3,
            ocr_timeout: Duration::from_secs(30),
            qr_timeout: Duration::from_secs(10),
            decode_timeout: Duration::from_secs(2),
            orientation: None,
            tesseract_path: None,
            engine_factory: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RecognitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionConfig")
            .field("ocr_max_edge", &self.ocr_max_edge)
            .field("qr_max_edge", &self.qr_max_edge)
            .field("threshold", &self.threshold)
            .field("language", &self.language)
            .field("engine_mode", &self.engine_mode)
            .field("dpi", &self.dpi)
            .field("page_seg_mode", &self.page_seg_mode)
            .field("ocr_timeout", &self.ocr_timeout)
            .field("qr_timeout", &self.qr_timeout)
            .field("decode_timeout", &self.decode_timeout)
            .field("orientation", &self.orientation)
            .field("tesseract_path", &self.tesseract_path)
            .field(
                "engine_factory",
                &self.engine_factory.as_ref().map(|f| f.name().to_string()),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RecognitionProgressCallback>"),
            )
            .finish()
    }
}

impl RecognitionConfig {
    /// Create a new builder for `RecognitionConfig`.
    pub fn builder() -> RecognitionConfigBuilder {
        RecognitionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RecognitionConfig`].
#[derive(Debug)]
pub struct RecognitionConfigBuilder {
    config: RecognitionConfig,
}

impl RecognitionConfigBuilder {
    pub fn ocr_max_edge(mut self, px: u32) -> Self {
        self.config.ocr_max_edge = px.max(16);
        self
    }

    pub fn qr_max_edge(mut self, px: u32) -> Self {
        self.config.qr_max_edge = px.max(16);
        self
    }

    pub fn threshold(mut self, t: u8) -> Self {
        self.config.threshold = t;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn engine_mode(mut self, mode: u8) -> Self {
        self.config.engine_mode = mode;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(70, 2400);
        self
    }

    pub fn page_seg_mode(mut self, psm: u8) -> Self {
        self.config.page_seg_mode = psm;
        self
    }

    pub fn ocr_timeout(mut self, d: Duration) -> Self {
        self.config.ocr_timeout = d;
        self
    }

    pub fn qr_timeout(mut self, d: Duration) -> Self {
        self.config.qr_timeout = d;
        self
    }

    pub fn decode_timeout(mut self, d: Duration) -> Self {
        self.config.decode_timeout = d;
        self
    }

    pub fn orientation(mut self, o: Orientation) -> Self {
        self.config.orientation = Some(o);
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn engine_factory(mut self, factory: Arc<dyn OcrEngineFactory>) -> Self {
        self.config.engine_factory = Some(factory);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RecognitionConfig, ProcessingError> {
        let c = &self.config;
        if c.language.trim().is_empty() {
            return Err(ProcessingError::invalid_input(
                "Invalid configuration: OCR language must not be empty",
            ));
        }
        if c.engine_mode > 3 {
            return Err(ProcessingError::invalid_input(format!(
                "Invalid configuration: engine mode must be 0–3, got {}",
                c.engine_mode
            )));
        }
        if c.page_seg_mode > 13 {
            return Err(ProcessingError::invalid_input(format!(
                "Invalid configuration: page segmentation mode must be 0–13, got {}",
                c.page_seg_mode
            )));
        }
        for (name, d) in [
            ("OCR timeout", c.ocr_timeout),
            ("QR timeout", c.qr_timeout),
            ("decode timeout", c.decode_timeout),
        ] {
            if d.is_zero() {
                return Err(ProcessingError::invalid_input(format!(
                    "Invalid configuration: {name} must be greater than zero"
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_match_tuned_values() {
        let c = RecognitionConfig::default();
        assert_eq!(c.ocr_max_edge, 1500);
        assert_eq!(c.qr_max_edge, 1024);
        assert_eq!(c.threshold, 140);
        assert_eq!(c.dpi, 300);
        assert_eq!(c.engine_mode, 1);
        assert_eq!(c.ocr_timeout, Duration::from_secs(30));
        assert_eq!(c.qr_timeout, Duration::from_secs(10));
        assert_eq!(c.decode_timeout, Duration::from_secs(2));
        assert!(c.orientation.is_none());
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = RecognitionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 70);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = RecognitionConfig::builder()
            .qr_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("QR timeout"));
    }

    #[test]
    fn builder_rejects_empty_language() {
        let err = RecognitionConfig::builder().language("  ").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let c = RecognitionConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("ocr_max_edge: 1500"));
        assert!(s.contains("engine_factory: None"));
    }
}
