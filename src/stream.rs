//! Streaming OCR API: progress and the final result as one event stream.
//!
//! [`crate::recognize::extract_text`] reports progress through a callback.
//! Callers that already live in `Stream` land (a websocket handler, a TUI
//! redraw loop) get the same events from [`extract_text_stream`] instead:
//! zero or more [`OcrEvent::Progress`] values, strictly increasing, then
//! exactly one [`OcrEvent::Finished`], then the end of the stream.
//!
//! The work runs on a spawned task. Dropping the stream aborts that task,
//! which drops the engine and kills any engine process still running.

use crate::config::RecognitionConfig;
use crate::error::ProcessingError;
use crate::output::OcrResult;
use crate::pipeline::input::EncodedImage;
use crate::progress::{ProgressCallback, RecognitionProgressCallback, RecognitionTask};
use crate::recognize::extract_text;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// One item of an OCR event stream.
#[derive(Debug, Clone)]
pub enum OcrEvent {
    /// A new, higher percentage in `0..=100`.
    Progress(u8),
    /// The outcome. Always the last item.
    Finished(Result<OcrResult, ProcessingError>),
}

/// A boxed stream of OCR events.
pub type OcrEventStream = Pin<Box<dyn Stream<Item = OcrEvent> + Send>>;

/// Run OCR on a spawned task and stream its events.
///
/// Must be called from within a tokio runtime. A progress callback already
/// present in `config` keeps receiving every event as well.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pixread::stream::{extract_text_stream, OcrEvent};
/// use pixread::{EncodedImage, RecognitionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let image = EncodedImage::from_bytes(std::fs::read("receipt.jpg")?)?;
/// let mut events = extract_text_stream(image, &RecognitionConfig::default());
/// while let Some(event) = events.next().await {
///     match event {
///         OcrEvent::Progress(p) => eprintln!("{p}%"),
///         OcrEvent::Finished(Ok(r)) => println!("{}", r.text),
///         OcrEvent::Finished(Err(e)) => eprintln!("error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn extract_text_stream(image: EncodedImage, config: &RecognitionConfig) -> OcrEventStream {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut cfg = config.clone();
    cfg.progress_callback = Some(Arc::new(ChannelProgress {
        tx: tx.clone(),
        inner: config.progress_callback.clone(),
    }));

    let task = tokio::spawn(async move {
        let result = extract_text(&image, &cfg).await;
        // Receiver gone means the stream was dropped; nobody is listening.
        let _ = tx.send(OcrEvent::Finished(result));
        debug!("OCR stream task finished");
    });

    Box::pin(EventStream {
        events: UnboundedReceiverStream::new(rx),
        task,
    })
}

/// Forwards progress into the channel, then to the caller's own callback.
struct ChannelProgress {
    tx: UnboundedSender<OcrEvent>,
    inner: Option<ProgressCallback>,
}

impl RecognitionProgressCallback for ChannelProgress {
    fn on_start(&self, task: RecognitionTask) {
        if let Some(ref cb) = self.inner {
            cb.on_start(task);
        }
    }

    fn on_progress(&self, task: RecognitionTask, percent: u8) {
        let _ = self.tx.send(OcrEvent::Progress(percent));
        if let Some(ref cb) = self.inner {
            cb.on_progress(task, percent);
        }
    }

    fn on_complete(&self, task: RecognitionTask) {
        if let Some(ref cb) = self.inner {
            cb.on_complete(task);
        }
    }

    fn on_error(&self, task: RecognitionTask, error: &str) {
        if let Some(ref cb) = self.inner {
            cb.on_error(task, error);
        }
    }
}

/// Receiver half plus the task feeding it; aborts the task on drop.
struct EventStream {
    events: UnboundedReceiverStream<OcrEvent>,
    task: JoinHandle<()>,
}

impl Stream for EventStream {
    type Item = OcrEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<OcrEvent>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn garbage_input_finishes_with_single_error() {
        let image = EncodedImage::new(vec![1u8, 2, 3], "image/jpeg").unwrap();
        let events: Vec<OcrEvent> = extract_text_stream(image, &RecognitionConfig::default())
            .collect()
            .await;

        assert_eq!(events.len(), 1, "got {events:?}");
        match &events[0] {
            OcrEvent::Finished(Err(e)) => {
                assert_eq!(e.kind(), crate::error::ErrorKind::DecodeFailure)
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
