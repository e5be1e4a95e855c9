//! QR codes: decode from a normalised buffer, render text to a PNG.
//!
//! Decoding makes exactly one detection pass with `rqrr`. Every grid found
//! in that pass is tried in order and the first one that decodes wins. A pass
//! that finds no grid, or only grids that fail error correction, is a
//! `NotFound`: the decoder worked, the photo just has no readable code.

use crate::error::ProcessingError;
use crate::output::QrResult;
use crate::pipeline::encode::encode_gray_png;
use crate::pipeline::input::EncodedImage;
use crate::pipeline::normalize::PixelBuffer;
use crate::pipeline::postprocess::wrap_qr;
use image::{GrayImage, Luma};
use qrcode::{Color, QrCode};
use tracing::{debug, warn};

/// Pixels per QR module in rendered codes.
pub const MODULE_PX: u32 = 8;

/// Light border around rendered codes, in modules. The QR standard asks for 4.
pub const QUIET_ZONE: u32 = 4;

/// Decode the first readable QR code in `buffer`.
pub fn decode_qr(buffer: &PixelBuffer) -> Result<QrResult, ProcessingError> {
    let (w, h) = buffer.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
        buffer.luma_at(x as u32, y as u32)
    });

    let grids = prepared.detect_grids();
    debug!("QR detection found {} candidate grid(s)", grids.len());
    if grids.is_empty() {
        return Err(ProcessingError::not_found(
            "No QR code detected. Ensure the QR code is clearly visible, well-lit, and not distorted.",
        ));
    }

    let mut last_err = None;
    for grid in &grids {
        match grid.decode() {
            Ok((meta, content)) => {
                debug!("Decoded QR version {:?}, {} bytes", meta.version, content.len());
                return wrap_qr(content);
            }
            Err(e) => {
                warn!("QR grid failed to decode: {:?}", e);
                last_err = Some(format!("{e:?}"));
            }
        }
    }

    Err(ProcessingError::not_found(format!(
        "A QR code was found but could not be read ({}).",
        last_err.unwrap_or_else(|| "unknown error".to_string())
    )))
}

/// Render `text` as a QR code PNG.
///
/// Fails with `InvalidInput` for empty text. Payloads beyond the largest QR
/// version surface as `EngineFailure`.
pub fn render_qr(text: &str) -> Result<EncodedImage, ProcessingError> {
    if text.is_empty() {
        return Err(ProcessingError::invalid_input("QR text must not be empty"));
    }

    let code = QrCode::new(text.as_bytes())
        .map_err(|e| ProcessingError::engine_failure("qr encoder", e.to_string()))?;

    let modules = code.width() as u32;
    let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;
    let mut img = GrayImage::from_pixel(side, side, Luma([255]));

    for my in 0..modules {
        for mx in 0..modules {
            if code[(mx as usize, my as usize)] != Color::Dark {
                continue;
            }
            let x0 = (mx + QUIET_ZONE) * MODULE_PX;
            let y0 = (my + QUIET_ZONE) * MODULE_PX;
            for y in y0..y0 + MODULE_PX {
                for x in x0..x0 + MODULE_PX {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }

    debug!("Rendered QR: {} modules → {}x{} px", modules, side, side);
    encode_gray_png(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgba, RgbaImage};

    fn buffer_from_png(png: &EncodedImage) -> PixelBuffer {
        PixelBuffer::new(image::load_from_memory(png.bytes()).unwrap().to_rgba8())
    }

    #[test]
    fn render_then_decode() {
        let png = render_qr("hello").unwrap();
        assert_eq!(png.mime_type(), "image/png");
        let result = decode_qr(&buffer_from_png(&png)).unwrap();
        assert_eq!(result.text, "hello");
    }

    #[test]
    fn rendered_code_has_quiet_zone() {
        let png = render_qr("quiet").unwrap();
        let buf = buffer_from_png(&png);
        let border = QUIET_ZONE * MODULE_PX;
        for i in 0..buf.width() {
            assert_eq!(buf.luma_at(i, border - 1), 255);
            assert_eq!(buf.luma_at(border - 1, i), 255);
        }
    }

    #[test]
    fn empty_text_is_invalid_input() {
        assert_eq!(render_qr("").unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn blank_image_is_not_found() {
        let blank = PixelBuffer::new(RgbaImage::from_pixel(200, 120, Rgba([255, 255, 255, 255])));
        let err = decode_qr(&blank).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn oversized_payload_is_engine_failure() {
        let huge = "x".repeat(8000);
        assert_eq!(render_qr(&huge).unwrap_err().kind(), ErrorKind::EngineFailure);
    }
}
