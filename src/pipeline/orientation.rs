//! EXIF orientation: read tag 0x0112 and apply it to a decoded image.
//!
//! Phone cameras store pixels in sensor order and record how to display them
//! in the orientation tag. A QR code photographed in portrait is still
//! decodable sideways, but the resize cap is computed on the displayed
//! dimensions, so the transform has to happen first.
//!
//! | value | rotation | mirror |
//! |-------|----------|--------|
//! | 1 | 0   | none       |
//! | 2 | 0   | horizontal |
//! | 3 | 180 | none       |
//! | 4 | 0   | vertical   |
//! | 5 | 90  | horizontal |
//! | 6 | 90  | none       |
//! | 7 | 270 | horizontal |
//! | 8 | 270 | none       |
//!
//! The transform is composed as translate to centre, rotate, mirror, scale,
//! draw. Read from the source side that means the mirror touches the pixels
//! first and the rotation second.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Quarter turns swap the axes.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Cw270)
    }
}

/// A decoded EXIF orientation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Orientation {
    /// The identity transform (EXIF value 1).
    pub const IDENTITY: Orientation = Orientation {
        rotation: Rotation::None,
        flip_horizontal: false,
        flip_vertical: false,
    };

    /// Map an EXIF orientation value. Anything outside 1–8 is the identity.
    pub fn from_exif(value: u32) -> Self {
        let (rotation, flip_horizontal, flip_vertical) = match value {
            2 => (Rotation::None, true, false),
            3 => (Rotation::Cw180, false, false),
            4 => (Rotation::None, false, true),
            5 => (Rotation::Cw90, true, false),
            6 => (Rotation::Cw90, false, false),
            7 => (Rotation::Cw270, true, false),
            8 => (Rotation::Cw270, false, false),
            _ => (Rotation::None, false, false),
        };
        Self {
            rotation,
            flip_horizontal,
            flip_vertical,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Output dimensions for a `width × height` source, before any scaling.
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Apply the transform to a decoded image.
    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        if self.is_identity() {
            return img;
        }
        let mut img = img;
        if self.flip_horizontal {
            img = img.fliph();
        }
        if self.flip_vertical {
            img = img.flipv();
        }
        match self.rotation {
            Rotation::None => img,
            Rotation::Cw90 => img.rotate90(),
            Rotation::Cw180 => img.rotate180(),
            Rotation::Cw270 => img.rotate270(),
        }
    }
}

/// Read the EXIF orientation value from encoded image bytes.
///
/// Returns 1 when there is no EXIF block, no orientation tag, or the
/// container is not one EXIF can live in.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(e) => e,
        Err(_) => return 1,
    };

    let value = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1);
    debug!("EXIF orientation tag: {}", value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn marked(w: u32, h: u32) -> DynamicImage {
        // Red top-left pixel, everything else white.
        let mut img = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        DynamicImage::ImageRgba8(img)
    }

    fn red_at(img: &DynamicImage) -> (u32, u32) {
        let rgba = img.to_rgba8();
        let (x, y, _) = rgba
            .enumerate_pixels()
            .find(|(_, _, p)| p.0 == [255, 0, 0, 255])
            .expect("marker pixel");
        (x, y)
    }

    #[test]
    fn exif_table() {
        assert!(Orientation::from_exif(1).is_identity());
        assert!(Orientation::from_exif(0).is_identity());
        assert!(Orientation::from_exif(9).is_identity());
        assert_eq!(Orientation::from_exif(3).rotation.degrees(), 180);
        let five = Orientation::from_exif(5);
        assert_eq!(five.rotation, Rotation::Cw90);
        assert!(five.flip_horizontal);
        assert!(Orientation::from_exif(4).flip_vertical);
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        for v in [5, 6, 7, 8] {
            assert_eq!(Orientation::from_exif(v).output_dimensions(40, 20), (20, 40));
        }
        for v in [1, 2, 3, 4] {
            assert_eq!(Orientation::from_exif(v).output_dimensions(40, 20), (40, 20));
        }
    }

    #[test]
    fn apply_rotates_and_mirrors() {
        let src = marked(4, 2);

        let six = Orientation::from_exif(6).apply(src.clone());
        assert_eq!((six.width(), six.height()), (2, 4));
        assert_eq!(red_at(&six), (1, 0));

        let two = Orientation::from_exif(2).apply(src.clone());
        assert_eq!(red_at(&two), (3, 0));

        // Mirror first, then rotate: top-left → top-right → bottom-right.
        let five = Orientation::from_exif(5).apply(src.clone());
        assert_eq!((five.width(), five.height()), (2, 4));
        assert_eq!(red_at(&five), (1, 3));

        let eight = Orientation::from_exif(8).apply(src);
        assert_eq!(red_at(&eight), (0, 3));
    }

    #[test]
    fn no_exif_defaults_to_one() {
        assert_eq!(read_exif_orientation(b"not an image at all"), 1);
        assert_eq!(read_exif_orientation(&[]), 1);
    }
}
