//! OCR engine adapter: one engine per call, always torn down.
//!
//! Engines are black boxes behind two traits. [`OcrEngineFactory`] creates a
//! fresh [`OcrEngine`] for every call; nothing is pooled or cached, so no
//! engine state can leak from one image into the next.
//!
//! ## Lifetime of an engine
//!
//! The engine lives in an [`EngineSlot`] owned by the caller, not by the
//! future doing the work. When the timeout fires, the work future is dropped
//! but the slot survives, and [`release`] still gets to call
//! [`OcrEngine::terminate`]. If the caller's own future is dropped
//! (external cancellation) the engine's `Drop` is the backstop; the
//! Tesseract backend kills its child process there.
//!
//! ## Backends
//!
//! [`TesseractCliFactory`] drives the `tesseract` executable: the PNG goes
//! in on stdin and word-level TSV comes back on stdout. Tests and embedders
//! plug their own factory in through
//! [`crate::config::RecognitionConfigBuilder::engine_factory`].

use crate::config::RecognitionConfig;
use crate::error::{ProcessingError, TimeoutStage};
use crate::pipeline::encode::encode_png;
use crate::pipeline::normalize::PixelBuffer;
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Upper bound on `terminate()` once a call is over.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Engine tuning, set once per engine before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineParameters {
    /// `1` = LSTM recogniser only.
    pub engine_mode: u8,
    pub dpi: u32,
    /// `3` = automatic page segmentation, no assumption of a single line.
    pub page_seg_mode: u8,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            engine_mode: 1,
            dpi: 300,
            page_seg_mode: 3,
        }
    }
}

impl EngineParameters {
    pub fn from_config(config: &RecognitionConfig) -> Self {
        Self {
            engine_mode: config.engine_mode,
            dpi: config.dpi,
            page_seg_mode: config.page_seg_mode,
        }
    }
}

/// What an engine hands back before cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecognition {
    pub text: String,
    /// 0–100.
    pub confidence: f32,
}

/// A failure inside an engine, before it is mapped to [`ProcessingError`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A single-use OCR engine instance.
///
/// Implementations must release their resources in `terminate`, and should
/// also do so on `Drop`, since a cancelled call never reaches `terminate`.
#[async_trait]
pub trait OcrEngine: Send {
    async fn set_parameters(&mut self, params: &EngineParameters) -> Result<(), EngineError>;

    async fn recognize(
        &mut self,
        buffer: &PixelBuffer,
        progress: &ProgressReporter,
    ) -> Result<RawRecognition, EngineError>;

    async fn terminate(&mut self) -> Result<(), EngineError>;
}

/// Creates one [`OcrEngine`] per call.
#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn create(&self, language: &str) -> Result<Box<dyn OcrEngine>, EngineError>;
}

/// Holds the engine of the call in flight, if one has been created.
pub type EngineSlot = Option<Box<dyn OcrEngine>>;

/// Pick the engine factory for a config.
///
/// Resolution order: pre-built factory, explicit tesseract path,
/// `TESSERACT_BIN`, then `tesseract` on `PATH`.
pub fn resolve_factory(config: &RecognitionConfig) -> Arc<dyn OcrEngineFactory> {
    if let Some(ref factory) = config.engine_factory {
        return Arc::clone(factory);
    }
    match config.tesseract_path {
        Some(ref path) => Arc::new(TesseractCliFactory::new(path.clone())),
        None => Arc::new(TesseractCliFactory::from_env()),
    }
}

/// Run OCR on an already normalised buffer, bounded by `limit`.
///
/// The engine is terminated on every exit path.
pub async fn recognize_text(
    buffer: &PixelBuffer,
    factory: &dyn OcrEngineFactory,
    language: &str,
    params: &EngineParameters,
    progress: &ProgressReporter,
    limit: Duration,
) -> Result<RawRecognition, ProcessingError> {
    let mut slot: EngineSlot = None;
    let outcome = tokio::time::timeout(
        limit,
        run_engine(buffer, factory, language, params, progress, &mut slot),
    )
    .await;
    settle(outcome, &mut slot, factory.name(), limit).await
}

/// Close out a bounded OCR attempt: release the engine in `slot`, then turn
/// an expired bound into `Timeout`.
///
/// `outcome` is what `tokio::time::timeout(limit, ...)` returned for work
/// that filled `slot`.
pub async fn settle<T>(
    outcome: Result<Result<T, ProcessingError>, tokio::time::error::Elapsed>,
    slot: &mut EngineSlot,
    engine_name: &str,
    limit: Duration,
) -> Result<T, ProcessingError> {
    release(slot, engine_name).await;
    outcome.map_err(|_| {
        warn!("OCR attempt timed out after {:?}", limit);
        ProcessingError::Timeout {
            stage: TimeoutStage::OcrAttempt,
            limit,
        }
    })?
}

/// Create an engine into `slot`, configure it, and recognise `buffer`.
///
/// Leaves the engine in the slot; pair every call with [`settle`] or [`release`].
pub async fn run_engine(
    buffer: &PixelBuffer,
    factory: &dyn OcrEngineFactory,
    language: &str,
    params: &EngineParameters,
    progress: &ProgressReporter,
    slot: &mut EngineSlot,
) -> Result<RawRecognition, ProcessingError> {
    let name = factory.name();
    let start = Instant::now();

    let engine = factory
        .create(language)
        .await
        .map_err(|e| ProcessingError::engine_failure(name, format!("initialisation: {e}")))?;
    let engine = slot.insert(engine);
    debug!("{} engine created ({})", name, language);

    engine
        .set_parameters(params)
        .await
        .map_err(|e| ProcessingError::engine_failure(name, format!("set parameters: {e}")))?;

    let raw = engine
        .recognize(buffer, progress)
        .await
        .map_err(|e| ProcessingError::engine_failure(name, e.to_string()))?;

    info!(
        "{} recognised {} chars (confidence {:.1}) in {:?}",
        name,
        raw.text.len(),
        raw.confidence,
        start.elapsed()
    );
    Ok(raw)
}

/// Terminate and drop the engine in `slot`, if any.
pub async fn release(slot: &mut EngineSlot, engine_name: &str) {
    let Some(mut engine) = slot.take() else {
        return;
    };
    match tokio::time::timeout(TEARDOWN_GRACE, engine.terminate()).await {
        Ok(Ok(())) => debug!("{} engine terminated", engine_name),
        Ok(Err(e)) => warn!("{} engine terminate failed: {}", engine_name, e),
        Err(_) => warn!(
            "{} engine did not terminate within {:?}; dropping it",
            engine_name, TEARDOWN_GRACE
        ),
    }
}

// ── Tesseract CLI backend ────────────────────────────────────────────────────

/// Factory for [`TesseractCli`] engines.
#[derive(Debug, Clone)]
pub struct TesseractCliFactory {
    binary: PathBuf,
}

impl TesseractCliFactory {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `TESSERACT_BIN` if set and non-empty, else `tesseract` from `PATH`.
    pub fn from_env() -> Self {
        match std::env::var("TESSERACT_BIN") {
            Ok(bin) if !bin.trim().is_empty() => Self::new(bin),
            _ => Self::new("tesseract"),
        }
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }
}

#[async_trait]
impl OcrEngineFactory for TesseractCliFactory {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn create(&self, language: &str) -> Result<Box<dyn OcrEngine>, EngineError> {
        if !is_valid_language(language) {
            return Err(EngineError::new(format!("invalid language code '{language}'")));
        }
        Ok(Box::new(TesseractCli {
            binary: self.binary.clone(),
            language: language.to_string(),
            params: EngineParameters::default(),
            child: None,
        }))
    }
}

/// One `tesseract` process per recognition.
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    params: EngineParameters,
    child: Option<Child>,
}

impl TesseractCli {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["stdin", "stdout", "-l", &self.language])
            .args(["--oem", &self.params.engine_mode.to_string()])
            .args(["--psm", &self.params.page_seg_mode.to_string()])
            .args(["--dpi", &self.params.dpi.to_string()])
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn set_parameters(&mut self, params: &EngineParameters) -> Result<(), EngineError> {
        self.params = *params;
        Ok(())
    }

    async fn recognize(
        &mut self,
        buffer: &PixelBuffer,
        progress: &ProgressReporter,
    ) -> Result<RawRecognition, EngineError> {
        progress.report(0);
        let png = encode_png(buffer).map_err(|e| EngineError::new(e.to_string()))?;

        let spawned = self.command().spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::new(format!(
                    "executable '{}' not found; install tesseract or set TESSERACT_BIN",
                    self.binary.display()
                ))
            } else {
                EngineError::new(format!("spawn failed: {e}"))
            }
        })?;
        let child = self.child.insert(spawned);
        debug!("Spawned tesseract pid {:?}", child.id());

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::new("stdin not captured"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::new("stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::new("stderr not captured"))?;

        let write = async {
            stdin.write_all(png.bytes()).await?;
            stdin.shutdown().await?;
            drop(stdin);
            progress.report(50);
            Ok::<_, std::io::Error>(())
        };
        let read_out = async {
            let mut out = Vec::new();
            stdout.read_to_end(&mut out).await.map(|_| out)
        };
        let read_err = async {
            let mut err = Vec::new();
            stderr.read_to_end(&mut err).await.map(|_| err)
        };
        let (written, out, err) = tokio::join!(write, read_out, read_err);

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::new(format!("wait failed: {e}")))?;
        self.child = None;

        if !status.success() {
            let stderr_text = err.map(|b| String::from_utf8_lossy(&b).trim().to_string()).unwrap_or_default();
            return Err(EngineError::new(format!("exited with {status}: {stderr_text}")));
        }
        written.map_err(|e| EngineError::new(format!("writing image: {e}")))?;
        let out = out.map_err(|e| EngineError::new(format!("reading output: {e}")))?;

        let raw = parse_tsv(&String::from_utf8_lossy(&out));
        progress.report(100);
        Ok(raw)
    }

    async fn terminate(&mut self) -> Result<(), EngineError> {
        if let Some(mut child) = self.child.take() {
            child
                .kill()
                .await
                .map_err(|e| EngineError::new(format!("kill failed: {e}")))?;
            debug!("Killed tesseract process");
        }
        Ok(())
    }
}

fn is_valid_language(language: &str) -> bool {
    !language.is_empty()
        && language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+')
}

/// Rebuild text and mean confidence from `tesseract ... tsv` output.
///
/// Words on the same line are joined with a space, lines with `\n`, and
/// paragraphs or blocks with a blank line. Confidence is the mean of the
/// non-negative word confidences, 0 when there are no words.
pub fn parse_tsv(tsv: &str) -> RawRecognition {
    let mut text = String::new();
    let mut last_line: Option<(u32, u32, u32, u32)> = None;
    let mut conf_sum = 0.0f64;
    let mut conf_count = 0u32;

    for row in tsv.lines() {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let key = (num(1), num(2), num(3), num(4));

        match last_line {
            None => {}
            Some(prev) if prev == key => text.push(' '),
            Some(prev) if (prev.0, prev.1, prev.2) == (key.0, key.1, key.2) => text.push('\n'),
            Some(_) => text.push_str("\n\n"),
        }
        text.push_str(word);
        last_line = Some(key);

        if let Ok(conf) = cols[10].trim().parse::<f64>() {
            if conf >= 0.0 {
                conf_sum += conf;
                conf_count += 1;
            }
        }
    }

    let confidence = if conf_count == 0 {
        0.0
    } else {
        (conf_sum / conf_count as f64).clamp(0.0, 100.0) as f32
    };
    RawRecognition { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::RecognitionTask;
    use image::{Rgba, RgbaImage};

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
2\t1\t1\t0\t0\t0\t10\t10\t300\t60\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t50\t20\t96.5\tHello
5\t1\t1\t1\t1\t2\t70\t10\t60\t20\t91.5\tworld
5\t1\t1\t1\t2\t1\t10\t40\t50\t20\t88\tsecond
5\t1\t2\t1\t1\t1\t10\t90\t50\t20\t-1\t
5\t1\t2\t1\t1\t2\t10\t90\t50\t20\t80\tnext
";

    #[test]
    fn parse_tsv_rebuilds_layout() {
        let raw = parse_tsv(TSV);
        assert_eq!(raw.text, "Hello world\nsecond\n\nnext");
        assert!((raw.confidence - 89.0).abs() < 0.01, "got {}", raw.confidence);
    }

    #[test]
    fn parse_tsv_empty_output() {
        let raw = parse_tsv("level\tpage_num\n");
        assert_eq!(raw.text, "");
        assert_eq!(raw.confidence, 0.0);
    }

    #[test]
    fn language_codes() {
        assert!(is_valid_language("eng"));
        assert!(is_valid_language("eng+chi_sim"));
        assert!(!is_valid_language(""));
        assert!(!is_valid_language("eng; rm -rf"));
    }

    #[test]
    fn resolve_prefers_explicit_path() {
        let config = RecognitionConfig::builder()
            .tesseract_path("/opt/tess/bin/tesseract")
            .build()
            .unwrap();
        assert_eq!(resolve_factory(&config).name(), "tesseract");
    }

    struct StalledFactory {
        terminated: Arc<std::sync::atomic::AtomicBool>,
    }

    struct StalledEngine {
        terminated: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl OcrEngineFactory for StalledFactory {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn create(&self, _language: &str) -> Result<Box<dyn OcrEngine>, EngineError> {
            Ok(Box::new(StalledEngine {
                terminated: Arc::clone(&self.terminated),
            }))
        }
    }

    #[async_trait]
    impl OcrEngine for StalledEngine {
        async fn set_parameters(&mut self, _params: &EngineParameters) -> Result<(), EngineError> {
            Ok(())
        }

        async fn recognize(
            &mut self,
            _buffer: &PixelBuffer,
            _progress: &ProgressReporter,
        ) -> Result<RawRecognition, EngineError> {
            std::future::pending().await
        }

        async fn terminate(&mut self) -> Result<(), EngineError> {
            self.terminated.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn recognize_text_timeout_terminates_engine() {
        let terminated = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let factory = StalledFactory {
            terminated: Arc::clone(&terminated),
        };
        let buffer = PixelBuffer::new(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])));

        let err = recognize_text(
            &buffer,
            &factory,
            "eng",
            &EngineParameters::default(),
            &ProgressReporter::silent(RecognitionTask::Ocr),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ProcessingError::Timeout {
                stage: TimeoutStage::OcrAttempt,
                ..
            }
        ));
        assert!(terminated.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn settle_releases_before_reporting() {
        let mut slot: EngineSlot = None;
        let ok: Result<Result<u8, ProcessingError>, tokio::time::error::Elapsed> = Ok(Ok(7));
        assert_eq!(settle(ok, &mut slot, "none", Duration::from_secs(1)).await.unwrap(), 7);
        assert!(slot.is_none());
    }

    #[tokio::test]
    async fn missing_binary_is_engine_failure() {
        let factory = TesseractCliFactory::new("/nonexistent/pixread-test/tesseract");
        let buffer = PixelBuffer::new(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])));
        let progress = ProgressReporter::silent(RecognitionTask::Ocr);

        let err = recognize_text(
            &buffer,
            &factory,
            "eng",
            &EngineParameters::default(),
            &progress,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EngineFailure);
        assert!(err.to_string().contains("not found"), "got: {err}");
    }
}
