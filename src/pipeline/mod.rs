//! Pipeline stages for image recognition.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and an engine can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//!                  ┌─▶ normalize (ocr) ──▶ ocr ──▶ postprocess::clean_text
//! input ──▶ decode ┤
//!                  └─▶ orientation ──▶ normalize (qr) ──▶ qr::decode_qr
//!
//! text ──▶ qr::render_qr ──▶ encode (PNG / data URL)
//! ```
//!
//! 1. [`input`]: data URL, file path or raw bytes → [`input::EncodedImage`]
//! 2. [`orientation`]: EXIF orientation tag → rotation/mirror
//! 3. [`normalize`]: decode, bound the longest edge, binarise for OCR
//! 4. [`ocr`]: scoped OCR engine with timeout and guaranteed teardown
//! 5. [`qr`]: single-pass QR decode, QR rendering
//! 6. [`postprocess`]: deterministic text cleanup
//! 7. [`encode`]: pixel buffer → PNG bytes

pub mod encode;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod orientation;
pub mod postprocess;
pub mod qr;
