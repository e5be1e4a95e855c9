//! Image normalisation: decode, bound the longest edge, and (for OCR) binarise.
//!
//! Two entry points, one per recognition path:
//!
//! * [`normalize_for_ocr`]: downscale to `ocr_max_edge`, grayscale by RGB
//!   average, hard threshold. Engines read high-contrast black-on-white far
//!   more reliably than raw phone photos with uneven lighting.
//! * [`normalize_for_qr`]: apply the orientation hint, then downscale to
//!   `qr_max_edge`. No thresholding: the QR decoder binarises adaptively.
//!
//! Both run CPU-bound pixel loops and are meant to be called from
//! `spawn_blocking` by the async layer.

use crate::config::RecognitionConfig;
use crate::error::ProcessingError;
use crate::pipeline::input::EncodedImage;
use crate::pipeline::orientation::Orientation;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbaImage};
use tracing::debug;

/// An owned RGBA pixel grid produced by normalisation.
///
/// Each call allocates its own buffer; buffers are never shared between
/// concurrent operations.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer(RgbaImage);

impl PixelBuffer {
    pub fn new(image: RgbaImage) -> Self {
        Self(image)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn longest_edge(&self) -> u32 {
        self.width().max(self.height())
    }

    /// Luminance of the pixel at `(x, y)` using the RGB average.
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let [r, g, b, _] = self.0.get_pixel(x, y).0;
        ((r as u16 + g as u16 + b as u16) / 3) as u8
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }

    pub fn into_image(self) -> RgbaImage {
        self.0
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        Self(img)
    }
}

/// Decode encoded bytes into an image.
pub fn decode_image(image: &EncodedImage) -> Result<DynamicImage, ProcessingError> {
    let img = image::load_from_memory(image.bytes())?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(ProcessingError::decode_failure("image has zero width or height"));
    }
    debug!("Decoded {} → {}x{} px", image.mime_type(), w, h);
    Ok(img)
}

/// Decode and prepare an image for OCR.
pub fn normalize_for_ocr(
    image: &EncodedImage,
    config: &RecognitionConfig,
) -> Result<PixelBuffer, ProcessingError> {
    let img = decode_image(image)?;
    Ok(prepare_for_ocr(img, config.ocr_max_edge, config.threshold))
}

/// Downscale and binarise an already decoded image.
pub fn prepare_for_ocr(img: DynamicImage, max_edge: u32, threshold: u8) -> PixelBuffer {
    let img = downscale(img, max_edge);
    let mut rgba = img.into_rgba8();

    for px in rgba.pixels_mut() {
        let [r, g, b, _] = px.0;
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        let v = if avg > threshold as u16 { 255 } else { 0 };
        px.0[0] = v;
        px.0[1] = v;
        px.0[2] = v;
    }

    debug!("OCR buffer ready: {}x{} px", rgba.width(), rgba.height());
    PixelBuffer(rgba)
}

/// Decode and prepare an image for QR decoding.
pub fn normalize_for_qr(
    image: &EncodedImage,
    orientation: Orientation,
    config: &RecognitionConfig,
) -> Result<PixelBuffer, ProcessingError> {
    let img = decode_image(image)?;
    Ok(prepare_for_qr(img, orientation, config.qr_max_edge))
}

/// Orient, then downscale, an already decoded image.
pub fn prepare_for_qr(img: DynamicImage, orientation: Orientation, max_edge: u32) -> PixelBuffer {
    let oriented = orientation.apply(img);
    let scaled = downscale(oriented, max_edge);
    debug!(
        "QR buffer ready: {}x{} px (rotation {}°)",
        scaled.width(),
        scaled.height(),
        orientation.rotation.degrees()
    );
    PixelBuffer(scaled.into_rgba8())
}

/// Target dimensions so the longest edge is at most `max_edge`.
///
/// Never upscales. Dimensions are floored, and never drop below 1.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return (width, height);
    }
    // Integer arithmetic keeps the longest edge exactly at `max_edge`.
    let scaled = |side: u32| ((side as u64 * max_edge as u64) / longest as u64).max(1) as u32;
    (scaled(width), scaled(height))
}

fn downscale(img: DynamicImage, max_edge: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let (tw, th) = fit_within(w, h, max_edge);
    if (tw, th) == (w, h) {
        return img;
    }
    debug!("Downscaling {}x{} → {}x{}", w, h, tw, th);
    img.resize_exact(tw, th, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png(img: RgbaImage) -> EncodedImage {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        EncodedImage::new(buf, "image/png").unwrap()
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(800, 600, 1500), (800, 600));
        assert_eq!(fit_within(1500, 10, 1500), (1500, 10));
    }

    #[test]
    fn fit_within_preserves_aspect_and_floors() {
        assert_eq!(fit_within(3000, 1000, 1500), (1500, 500));
        assert_eq!(fit_within(1000, 3001, 1500), (499, 1500));
        assert_eq!(fit_within(5000, 1, 1024), (1024, 1));
    }

    #[test]
    fn ocr_threshold_is_strictly_greater() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([140, 140, 140, 255]));
        img.put_pixel(1, 0, Rgba([141, 141, 141, 255]));
        img.put_pixel(2, 0, Rgba([255, 0, 200, 128]));

        let out = prepare_for_ocr(DynamicImage::ImageRgba8(img), 1500, 140);
        let px = out.as_image();
        assert_eq!(px.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(px.get_pixel(1, 0).0, [255, 255, 255, 255]);
        // avg = 151 → white, alpha preserved
        assert_eq!(px.get_pixel(2, 0).0, [255, 255, 255, 128]);
    }

    #[test]
    fn ocr_output_respects_cap() {
        let img = png(RgbaImage::from_pixel(3000, 1000, Rgba([200, 200, 200, 255])));
        let config = RecognitionConfig::default();
        let out = normalize_for_ocr(&img, &config).unwrap();
        assert_eq!(out.dimensions(), (1500, 500));
        assert!(out.longest_edge() <= 1500);
    }

    #[test]
    fn qr_output_respects_cap_after_rotation() {
        let img = png(RgbaImage::from_pixel(1200, 2400, Rgba([0, 0, 0, 255])));
        let config = RecognitionConfig::default();
        let out = normalize_for_qr(&img, Orientation::from_exif(6), &config).unwrap();
        assert_eq!(out.dimensions(), (1024, 512));
    }

    #[test]
    fn qr_orientation_six_swaps_dimensions() {
        let img = png(RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255])));
        let config = RecognitionConfig::default();
        let out = normalize_for_qr(&img, Orientation::from_exif(6), &config).unwrap();
        assert_eq!(out.dimensions(), (20, 40));
    }

    #[test]
    fn garbage_bytes_are_decode_failure() {
        let img = EncodedImage::new(b"\x89PNG\r\n\x1a\nbroken".to_vec(), "image/png").unwrap();
        let err = normalize_for_ocr(&img, &RecognitionConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn luma_is_rgb_average() {
        let buf = PixelBuffer::new(RgbaImage::from_pixel(1, 1, Rgba([30, 60, 90, 0])));
        assert_eq!(buf.luma_at(0, 0), 60);
    }
}
