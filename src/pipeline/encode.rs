//! Image encoding: pixel buffers → PNG [`EncodedImage`].
//!
//! PNG is lossless, which matters twice here: the thresholded OCR buffer must
//! reach the engine with its hard black/white edges intact, and a generated
//! QR code must stay decodable after a round trip through a data URL.

use crate::error::ProcessingError;
use crate::pipeline::input::EncodedImage;
use crate::pipeline::normalize::PixelBuffer;
use image::{DynamicImage, GrayImage};
use std::io::Cursor;
use tracing::debug;

/// Encode a normalised buffer as PNG.
pub fn encode_png(buffer: &PixelBuffer) -> Result<EncodedImage, ProcessingError> {
    write_png(&DynamicImage::ImageRgba8(buffer.as_image().clone()))
}

/// Encode a single-channel image as PNG.
pub fn encode_gray_png(img: GrayImage) -> Result<EncodedImage, ProcessingError> {
    write_png(&DynamicImage::ImageLuma8(img))
}

fn write_png(img: &DynamicImage) -> Result<EncodedImage, ProcessingError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ProcessingError::engine_failure("png encoder", e.to_string()))?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    EncodedImage::new(buf, "image/png")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    #[test]
    fn encode_small_buffer() {
        let buf = PixelBuffer::new(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&buf).expect("encode should succeed");
        assert_eq!(png.mime_type(), "image/png");
        let back = image::load_from_memory(png.bytes()).expect("valid png");
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn encode_gray() {
        let png = encode_gray_png(GrayImage::from_pixel(3, 5, Luma([0]))).unwrap();
        assert!(png.to_data_url().starts_with("data:image/png;base64,iVBOR"));
    }
}
