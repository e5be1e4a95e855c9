//! Progress-callback trait for recognition events.
//!
//! Inject an [`Arc<dyn RecognitionProgressCallback>`] via
//! [`crate::config::RecognitionConfigBuilder::progress_callback`] to receive
//! events while a single OCR or QR operation runs.
//!
//! Percentages are coarse: they follow whatever phase signals the engine
//! gives us. [`ProgressReporter`] sits between the engine and the callback and
//! guarantees the values a callback sees are clamped to 0–100, strictly
//! increasing, and never repeated. No fixed number of calls is promised.
//!
//! # Example
//!
//! ```rust
//! use pixread::{RecognitionConfig, RecognitionProgressCallback, RecognitionTask};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl RecognitionProgressCallback for Printer {
//!     fn on_progress(&self, task: RecognitionTask, percent: u8) {
//!         eprintln!("{task}: {percent}%");
//!     }
//! }
//!
//! let config = RecognitionConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Which operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionTask {
    Ocr,
    QrScan,
}

impl fmt::Display for RecognitionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionTask::Ocr => f.write_str("ocr"),
            RecognitionTask::QrScan => f.write_str("qr-scan"),
        }
    }
}

/// Called by the pipeline while an operation is in flight.
///
/// All methods default to no-ops, so implementors only override what they
/// need. Engines may report from a blocking thread, hence `Send + Sync`.
pub trait RecognitionProgressCallback: Send + Sync {
    /// Called once before any decoding starts.
    fn on_start(&self, task: RecognitionTask) {
        let _ = task;
    }

    /// Called with a new, higher percentage in `0..=100`.
    fn on_progress(&self, task: RecognitionTask, percent: u8) {
        let _ = (task, percent);
    }

    /// Called once when a result is produced.
    fn on_complete(&self, task: RecognitionTask) {
        let _ = task;
    }

    /// Called once when the operation ends in an error.
    fn on_error(&self, task: RecognitionTask, error: &str) {
        let _ = (task, error);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl RecognitionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RecognitionConfig`].
pub type ProgressCallback = Arc<dyn RecognitionProgressCallback>;

/// Per-operation progress gate handed to engines.
///
/// The comparison with the last value and the callback run under one lock,
/// so callbacks see strictly increasing values even when several threads
/// report at once. Callbacks must not call back into the same reporter.
pub struct ProgressReporter {
    task: RecognitionTask,
    callback: Option<ProgressCallback>,
    last: Mutex<Option<u8>>,
}

impl ProgressReporter {
    pub fn new(task: RecognitionTask, callback: Option<ProgressCallback>) -> Self {
        Self {
            task,
            callback,
            last: Mutex::new(None),
        }
    }

    /// A reporter that drops every event.
    pub fn silent(task: RecognitionTask) -> Self {
        Self::new(task, None)
    }

    pub fn task(&self) -> RecognitionTask {
        self.task
    }

    /// Report a fraction in `0.0..=1.0`, the unit most engines use.
    pub fn report_fraction(&self, fraction: f32) {
        let pct = if fraction.is_finite() {
            (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
        } else {
            0
        };
        self.report(pct);
    }

    /// Report a percentage. Values above 100 are clamped; values not above
    /// the last reported one are dropped.
    pub fn report(&self, percent: u8) {
        let pct = percent.min(100);
        let mut last = self.lock_last();
        if matches!(*last, Some(prev) if pct <= prev) {
            return;
        }
        *last = Some(pct);
        if let Some(ref cb) = self.callback {
            cb.on_progress(self.task, pct);
        }
    }

    /// Last value that reached the callback, if any.
    pub fn last_reported(&self) -> Option<u8> {
        *self.lock_last()
    }

    fn lock_last(&self) -> MutexGuard<'_, Option<u8>> {
        // A panicking callback leaves the stored value intact.
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn start(&self) {
        if let Some(ref cb) = self.callback {
            cb.on_start(self.task);
        }
    }

    pub(crate) fn complete(&self) {
        if let Some(ref cb) = self.callback {
            cb.on_complete(self.task);
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if let Some(ref cb) = self.callback {
            cb.on_error(self.task, message);
        }
    }
}
