//! # pixread
//!
//! Read text and QR codes from photos, and render QR codes.
//!
//! ## Why this crate?
//!
//! Phone photos are a poor input for an OCR engine as they come off the
//! camera: 12-megapixel frames, EXIF-rotated, with shadows and colour noise.
//! This crate normalises each photo for its task first (downscale and
//! binarise for OCR; EXIF orientation and downscale for QR), runs a
//! per-call engine under a hard time bound, and cleans the result up. Every
//! call ends in exactly one result or one classified [`ProcessingError`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! data URL / file / bytes
//!  │
//!  ├─ 1. Input      MIME-tagged EncodedImage, non-images rejected
//!  ├─ 2. Normalise  OCR: ≤1500 px + threshold 140 · QR: EXIF orient + ≤1024 px
//!  ├─ 3. Recognise  OCR: one engine per call (30 s) · QR: rqrr (10 s, decode 2 s)
//!  └─ 4. Polish     clean_text for OCR · empty QR payload → NotFound
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pixread::{extract_text, scan_qr, EncodedImage, RecognitionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RecognitionConfig::default();
//!     let photo = EncodedImage::from_bytes(std::fs::read("receipt.jpg")?)?;
//!
//!     let ocr = extract_text(&photo, &config).await?;
//!     println!("{} (confidence {:.0})", ocr.text, ocr.confidence);
//!
//!     match scan_qr(&photo, &config).await {
//!         Ok(qr) => println!("QR: {}", qr.text),
//!         Err(e) if e.is_not_found() => println!("no QR code"),
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pixread` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pixread = { version = "0.3", default-features = false }
//! ```
//!
//! ## OCR Engines
//!
//! The default engine is the `tesseract` executable (set `TESSERACT_BIN` or
//! [`RecognitionConfigBuilder::tesseract_path`] if it is not on `PATH`).
//! Any other engine can be plugged in by implementing
//! [`pipeline::ocr::OcrEngineFactory`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod recognize;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RecognitionConfig, RecognitionConfigBuilder};
pub use error::{ErrorKind, ProcessingError, TimeoutStage};
pub use output::{OcrResult, QrResult};
pub use pipeline::input::EncodedImage;
pub use pipeline::normalize::PixelBuffer;
pub use pipeline::orientation::{Orientation, Rotation};
pub use progress::{
    NoopProgressCallback, ProgressCallback, ProgressReporter, RecognitionProgressCallback,
    RecognitionTask,
};
pub use recognize::{
    extract_text, extract_text_from_data_url, extract_text_sync, generate_qr, generate_qr_data_url,
    scan_qr, scan_qr_from_data_url, scan_qr_sync,
};
pub use stream::{extract_text_stream, OcrEvent, OcrEventStream};
