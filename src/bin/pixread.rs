//! CLI binary for pixread.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RecognitionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pixread::pipeline::input::resolve_input;
use pixread::{
    extract_text, generate_qr, scan_qr, Orientation, ProgressCallback, RecognitionConfig,
    RecognitionProgressCallback, RecognitionTask,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Percentage bar for a single recognition call.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RecognitionProgressCallback for CliProgressCallback {
    fn on_start(&self, task: RecognitionTask) {
        let prefix = match task {
            RecognitionTask::Ocr => "Reading text",
            RecognitionTask::QrScan => "Scanning QR",
        };
        self.bar.set_prefix(prefix);
    }

    fn on_progress(&self, _task: RecognitionTask, percent: u8) {
        self.bar.set_position(percent as u64);
    }

    fn on_complete(&self, _task: RecognitionTask) {
        self.bar.finish_and_clear();
        eprintln!("{} done in {:.1}s", green("✔"), self.bar.elapsed().as_secs_f64());
    }

    fn on_error(&self, _task: RecognitionTask, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(error));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Read text from a photo
  pixread ocr receipt.jpg

  # Same, as JSON with confidence
  pixread --json ocr receipt.jpg

  # Scan a QR code (EXIF rotation is honoured)
  pixread scan ticket.jpg

  # Force an orientation (EXIF values 1-8)
  pixread --orientation 6 scan ticket.jpg

  # Generate a QR code PNG
  pixread generate "https://example.com" -o code.png

  # Generate a QR code as a data URL on stdout
  pixread generate "hello"

ENVIRONMENT VARIABLES:
  TESSERACT_BIN           Path to the tesseract executable
  PIXREAD_LANGUAGE        OCR language(s), e.g. eng or eng+deu
  PIXREAD_OCR_TIMEOUT     OCR time bound in seconds
  PIXREAD_QR_TIMEOUT      QR time bound in seconds
  RUST_LOG                Overrides -v / -q log filtering
"#;

/// Read text and QR codes from images, and generate QR codes.
#[derive(Parser, Debug)]
#[command(
    name = "pixread",
    version,
    about = "Read text and QR codes from images, and generate QR codes",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text from an image file or data URL.
    Ocr {
        /// Image file path or `data:image/...;base64,` URL.
        input: String,
    },
    /// Decode a QR code from an image file or data URL.
    Scan {
        /// Image file path or `data:image/...;base64,` URL.
        input: String,
    },
    /// Render text as a QR code PNG.
    Generate {
        /// Text to encode.
        text: String,

        /// Write the PNG to this file instead of printing a data URL.
        #[arg(short, long, env = "PIXREAD_OUTPUT")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// OCR language(s) in engine notation.
    #[arg(long, global = true, env = "PIXREAD_LANGUAGE", default_value = "eng")]
    language: String,

    /// Binarisation threshold for OCR (0–255).
    #[arg(long, global = true, env = "PIXREAD_THRESHOLD", default_value_t = 140)]
    threshold: u8,

    /// Page segmentation mode passed to the engine (0–13).
    #[arg(long, global = true, env = "PIXREAD_PSM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Override EXIF orientation for QR scans (1–8).
    #[arg(long, global = true, env = "PIXREAD_ORIENTATION",
          value_parser = clap::value_parser!(u32).range(1..=8))]
    orientation: Option<u32>,

    /// OCR time bound in seconds.
    #[arg(long, global = true, env = "PIXREAD_OCR_TIMEOUT", default_value_t = 30)]
    ocr_timeout: u64,

    /// QR time bound in seconds.
    #[arg(long, global = true, env = "PIXREAD_QR_TIMEOUT", default_value_t = 10)]
    qr_timeout: u64,

    /// Path to the tesseract executable.
    #[arg(long, global = true, env = "TESSERACT_BIN")]
    tesseract: Option<PathBuf>,

    /// Output structured JSON instead of plain text.
    #[arg(long, global = true, env = "PIXREAD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PIXREAD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PIXREAD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PIXREAD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v asks for them.
    let show_progress = !opts.quiet && !opts.no_progress && !opts.json;
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Ocr { ref input } => {
            let config = build_config(opts, show_progress)?;
            let image = resolve_input(input).await.context("Failed to load image")?;
            let result = extract_text(&image, &config)
                .await
                .context("Text recognition failed")?;

            if opts.json {
                print_json(&result)?;
            } else {
                if result.is_empty() && !opts.quiet {
                    eprintln!("{}", dim("(no text found)"));
                }
                print_line(&result.text)?;
                if !opts.quiet {
                    eprintln!("{}", dim(&format!("confidence {:.0}", result.confidence)));
                }
            }
        }
        Command::Scan { ref input } => {
            let config = build_config(opts, show_progress)?;
            let image = resolve_input(input).await.context("Failed to load image")?;
            let result = scan_qr(&image, &config).await.context("QR scan failed")?;

            if opts.json {
                print_json(&result)?;
            } else {
                print_line(&result.text)?;
            }
        }
        Command::Generate {
            ref text,
            ref output,
        } => {
            let png = generate_qr(text).context("QR generation failed")?;

            match output {
                Some(path) => {
                    write_atomic(path, png.bytes())?;
                    if opts.json {
                        print_json(&serde_json::json!({ "path": path, "bytes": png.len() }))?;
                    } else if !opts.quiet {
                        eprintln!("{} wrote {} ({} bytes)", green("✔"), path.display(), png.len());
                    }
                }
                None if opts.json => {
                    print_json(&serde_json::json!({ "data_url": png.to_data_url() }))?
                }
                None => print_line(&png.to_data_url())?,
            }
        }
    }

    Ok(())
}

/// Map CLI args to `RecognitionConfig`.
fn build_config(opts: &GlobalOpts, show_progress: bool) -> Result<RecognitionConfig> {
    let mut builder = RecognitionConfig::builder()
        .language(opts.language.clone())
        .threshold(opts.threshold)
        .page_seg_mode(opts.psm)
        .ocr_timeout(Duration::from_secs(opts.ocr_timeout))
        .qr_timeout(Duration::from_secs(opts.qr_timeout));

    if let Some(value) = opts.orientation {
        builder = builder.orientation(Orientation::from_exif(value));
    }
    if let Some(ref path) = opts.tesseract {
        builder = builder.tesseract_path(path.clone());
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    print_line(&json)
}

fn print_line(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Write via a temp file in the target directory, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("Failed to write PNG")?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
