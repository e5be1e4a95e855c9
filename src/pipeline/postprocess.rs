//! Post-processing: deterministic cleanup of raw OCR text.
//!
//! OCR engines emit ragged whitespace, stray blank lines, and line noise
//! such as `|`, `~` or `»` picked up from borders and shadows. [`clean_text`]
//! strips that without touching words or sentence punctuation.
//!
//! ## Rule Order
//!
//! Line structure is settled before characters are stripped, and whitespace
//! is settled again afterwards, because removing a symbol can leave a double
//! space or an empty line behind.

use crate::error::ProcessingError;
use crate::output::QrResult;
use once_cell::sync::Lazy;
use regex::Regex;

/// Clean raw OCR output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Collapse runs of horizontal whitespace to a single space
/// 3. Trim every line and drop empty ones (collapses blank-line runs)
/// 4. Strip characters other than word characters, whitespace and `.,!?-`
/// 5. Repeat rules 2–3 and trim the whole string
///
/// The function is idempotent: its output is a fixed point of every rule.
pub fn clean_text(raw: &str) -> String {
    let s = normalise_line_endings(raw);
    let s = collapse_horizontal_whitespace(&s);
    let s = tidy_lines(&s);
    let s = strip_noise(&s);
    let s = collapse_horizontal_whitespace(&s);
    tidy_lines(&s).trim().to_string()
}

/// Wrap a decoded QR payload. An empty payload counts as "nothing found".
pub fn wrap_qr(raw: impl Into<String>) -> Result<QrResult, ProcessingError> {
    let text = raw.into();
    if text.is_empty() {
        return Err(ProcessingError::not_found("No QR code found in the image."));
    }
    Ok(QrResult { text })
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Collapse horizontal whitespace ──────────────────────────────────

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

fn collapse_horizontal_whitespace(input: &str) -> String {
    RE_HSPACE.replace_all(input, " ").into_owned()
}

// ── Rule 3: Trim lines, drop empty ones ──────────────────────────────────────

fn tidy_lines(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Strip noise characters ───────────────────────────────────────────

static RE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.,!?-]").unwrap());

fn strip_noise(input: &str) -> String {
    RE_NOISE.replace_all(input, "").into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
