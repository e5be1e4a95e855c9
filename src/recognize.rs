//! Eager recognition entry points: one image in, one result or error out.
//!
//! Each call is a single unit of work with its own buffers and, for OCR, its
//! own engine instance. Nothing is shared between calls except the config's
//! `Arc`s. Use [`crate::stream::extract_text_stream`] instead when progress
//! should arrive as a `Stream` rather than through a callback.
//!
//! ## Time bounds
//!
//! | Operation | Bound | Covers |
//! |-----------|-------|--------|
//! | OCR       | `ocr_timeout` (30 s)    | decode, normalise, engine |
//! | QR        | `qr_timeout` (10 s)     | decode, orient, scale, detect |
//! | QR decode | `decode_timeout` (2 s)  | image decoding only |
//!
//! CPU-bound stages run on `spawn_blocking`. A timeout abandons the blocking
//! task rather than interrupting it; the caller gets `Timeout` immediately.

use crate::config::RecognitionConfig;
use crate::error::{ProcessingError, TimeoutStage};
use crate::output::{OcrResult, QrResult};
use crate::pipeline::input::EncodedImage;
use crate::pipeline::ocr::{self, EngineParameters, EngineSlot, OcrEngineFactory};
use crate::pipeline::orientation::{read_exif_orientation, Orientation};
use crate::pipeline::{normalize, postprocess, qr};
use crate::progress::{ProgressReporter, RecognitionTask};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract text from an image.
///
/// Returns `Ok` with an empty `text` when the engine found nothing.
///
/// # Errors
/// - `DecodeFailure`: the bytes are not a decodable image
/// - `EngineFailure`: the engine could not start or crashed
/// - `Timeout`: the attempt exceeded `ocr_timeout`
///
/// The engine is terminated on every one of these paths.
pub async fn extract_text(
    image: &EncodedImage,
    config: &RecognitionConfig,
) -> Result<OcrResult, ProcessingError> {
    let start = Instant::now();
    info!("Starting OCR: {} ({} bytes)", image.mime_type(), image.len());

    let reporter = ProgressReporter::new(RecognitionTask::Ocr, config.progress_callback.clone());
    reporter.start();

    let factory = ocr::resolve_factory(config);
    let mut slot: EngineSlot = None;
    let outcome = tokio::time::timeout(
        config.ocr_timeout,
        ocr_attempt(image, config, factory.as_ref(), &reporter, &mut slot),
    )
    .await;
    let result = ocr::settle(outcome, &mut slot, factory.name(), config.ocr_timeout).await;
    finish(&reporter, result, start)
}

async fn ocr_attempt(
    image: &EncodedImage,
    config: &RecognitionConfig,
    factory: &dyn OcrEngineFactory,
    reporter: &ProgressReporter,
    slot: &mut EngineSlot,
) -> Result<OcrResult, ProcessingError> {
    let owned = image.clone();
    let (max_edge, threshold) = (config.ocr_max_edge, config.threshold);
    let buffer = run_blocking("normalise", move || {
        let img = normalize::decode_image(&owned)?;
        Ok(normalize::prepare_for_ocr(img, max_edge, threshold))
    })
    .await?;

    let params = EngineParameters::from_config(config);
    let raw = ocr::run_engine(&buffer, factory, &config.language, &params, reporter, slot).await?;

    let text = postprocess::clean_text(&raw.text);
    debug!("Cleaned OCR text: {} → {} chars", raw.text.len(), text.len());
    Ok(OcrResult {
        text,
        confidence: raw.confidence,
    })
}

/// Extract text from a `data:image/...;base64,` URL.
pub async fn extract_text_from_data_url(
    data_url: &str,
    config: &RecognitionConfig,
) -> Result<OcrResult, ProcessingError> {
    let image = EncodedImage::from_data_url(data_url)?;
    extract_text(&image, config).await
}

/// Synchronous wrapper around [`extract_text`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_text_sync(
    image: &EncodedImage,
    config: &RecognitionConfig,
) -> Result<OcrResult, ProcessingError> {
    new_runtime()?.block_on(extract_text(image, config))
}

/// Decode the QR code in an image.
///
/// Orientation comes from `config.orientation` when set, otherwise from the
/// image's EXIF metadata.
///
/// # Errors
/// - `NotFound`: no readable QR code; the normal "nothing here" outcome
/// - `DecodeFailure`: the bytes are not a decodable image
/// - `Timeout`: decoding exceeded `decode_timeout`, or the whole attempt
///   exceeded `qr_timeout`
pub async fn scan_qr(
    image: &EncodedImage,
    config: &RecognitionConfig,
) -> Result<QrResult, ProcessingError> {
    let start = Instant::now();
    info!("Starting QR scan: {} ({} bytes)", image.mime_type(), image.len());

    let reporter = ProgressReporter::new(RecognitionTask::QrScan, config.progress_callback.clone());
    reporter.start();

    let result = tokio::time::timeout(config.qr_timeout, qr_attempt(image, config, &reporter))
        .await
        .unwrap_or_else(|_| {
            Err(ProcessingError::Timeout {
                stage: TimeoutStage::QrAttempt,
                limit: config.qr_timeout,
            })
        });
    finish(&reporter, result, start)
}

async fn qr_attempt(
    image: &EncodedImage,
    config: &RecognitionConfig,
    reporter: &ProgressReporter,
) -> Result<QrResult, ProcessingError> {
    let orientation = match config.orientation {
        Some(o) => o,
        None => Orientation::from_exif(read_exif_orientation(image.bytes())),
    };
    debug!("QR orientation: {:?}", orientation);

    let owned = image.clone();
    let decoded = tokio::time::timeout(
        config.decode_timeout,
        run_blocking("decode", move || normalize::decode_image(&owned)),
    )
    .await
    .map_err(|_| ProcessingError::Timeout {
        stage: TimeoutStage::ImageDecode,
        limit: config.decode_timeout,
    })??;
    reporter.report(25);

    let max_edge = config.qr_max_edge;
    let result = run_blocking("qr detect", move || {
        let buffer = normalize::prepare_for_qr(decoded, orientation, max_edge);
        qr::decode_qr(&buffer)
    })
    .await?;

    reporter.report(100);
    Ok(result)
}

/// Decode the QR code in a `data:image/...;base64,` URL.
pub async fn scan_qr_from_data_url(
    data_url: &str,
    config: &RecognitionConfig,
) -> Result<QrResult, ProcessingError> {
    let image = EncodedImage::from_data_url(data_url)?;
    scan_qr(&image, config).await
}

/// Synchronous wrapper around [`scan_qr`].
pub fn scan_qr_sync(
    image: &EncodedImage,
    config: &RecognitionConfig,
) -> Result<QrResult, ProcessingError> {
    new_runtime()?.block_on(scan_qr(image, config))
}

/// Render `text` as a QR code PNG.
///
/// Error correction is level M, which holds up to 2331 bytes of binary
/// payload (version 40). Longer text fails with `EngineFailure`; empty text
/// fails with `InvalidInput`.
pub fn generate_qr(text: &str) -> Result<EncodedImage, ProcessingError> {
    let png = qr::render_qr(text)?;
    info!("Generated QR code for {} chars ({} bytes PNG)", text.len(), png.len());
    Ok(png)
}

/// Render `text` as a QR code and return it as a PNG data URL.
pub fn generate_qr_data_url(text: &str) -> Result<String, ProcessingError> {
    Ok(generate_qr(text)?.to_data_url())
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn run_blocking<T, F>(stage: &'static str, f: F) -> Result<T, ProcessingError>
where
    F: FnOnce() -> Result<T, ProcessingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        ProcessingError::engine_failure("worker", format!("{stage} task failed: {e}"))
    })?
}

fn finish<T>(
    reporter: &ProgressReporter,
    result: Result<T, ProcessingError>,
    start: Instant,
) -> Result<T, ProcessingError> {
    let task = reporter.task();
    match &result {
        Ok(_) => {
            reporter.complete();
            info!("{} finished in {:?}", task, start.elapsed());
        }
        Err(e) if e.is_not_found() => {
            reporter.error(&e.to_string());
            info!("{} found nothing ({:?})", task, start.elapsed());
        }
        Err(e) => {
            reporter.error(&e.to_string());
            warn!("{} failed after {:?}: {}", task, start.elapsed(), e);
        }
    }
    result
}

fn new_runtime() -> Result<tokio::runtime::Runtime, ProcessingError> {
    tokio::runtime::Runtime::new().map_err(|e| {
        ProcessingError::engine_failure("tokio runtime", format!("failed to start: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn generate_qr_rejects_empty_text() {
        assert_eq!(generate_qr("").unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn generate_qr_capacity_edge() {
        assert!(generate_qr(&"x".repeat(2331)).is_ok());
        let err = generate_qr(&"x".repeat(2332)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineFailure);
    }

    #[test]
    fn generate_then_scan_sync() {
        let png = generate_qr("sync-path").unwrap();
        let result = scan_qr_sync(&png, &RecognitionConfig::default()).unwrap();
        assert_eq!(result.text, "sync-path");
    }

    #[tokio::test]
    async fn scan_garbage_is_decode_failure() {
        let image = EncodedImage::new(vec![0u8; 64], "image/png").unwrap();
        let err = scan_qr(&image, &RecognitionConfig::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[tokio::test]
    async fn scan_rejects_non_image_data_url() {
        let err = scan_qr_from_data_url("data:text/plain;base64,aGVsbG8=", &RecognitionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
