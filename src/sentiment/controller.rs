//! Sentiment page controller.
//!
//! Wires the page's text input and example buttons to the scoring endpoint.

use super::client::{HttpScoreClient, ScoreApi};
use super::visualization::VisualizationSink;
use crate::bootstrap::PageContext;
use crate::settings::AppSettings;
use crate::utils::{truncate_text, Debouncer, ELLIPSIS};
use log::{debug, error, info};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// What happened to one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Text was blank; nothing was sent.
    Skipped,
    /// Scores arrived and were handed to the visualization.
    Rendered,
    /// The request or its response failed. Already logged.
    Failed,
}

/// Counts one submission as in flight until dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Submitter {
    api: Arc<dyn ScoreApi>,
    sink: Arc<dyn VisualizationSink>,
    max_text_length: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Submitter {
    async fn submit(&self, text: &str) -> SubmitOutcome {
        let _in_flight = InFlight::enter(&self.in_flight);
        self.send(text).await
    }

    /// Callers hold an [`InFlight`] for the duration.
    async fn send(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            debug!("SentimentController: empty text, not submitting");
            return SubmitOutcome::Skipped;
        }

        let text = payload_text(text, self.max_text_length);

        match self.api.score(&text).await {
            Ok(score) => {
                self.sink.update(&score);
                SubmitOutcome::Rendered
            }
            Err(e) => {
                error!("Error: {}", e);
                SubmitOutcome::Failed
            }
        }
    }
}

/// Shortens `text` so the submitted value, ellipsis included, fits in `max_length`.
fn payload_text(text: &str, max_length: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_length {
        return Cow::Borrowed(text);
    }
    if max_length < ELLIPSIS.len() {
        // No room for the ellipsis
        return Cow::Owned(text.chars().take(max_length).collect());
    }
    truncate_text(Some(text), max_length - ELLIPSIS.len()).unwrap_or_default()
}

pub struct SentimentController {
    submitter: Arc<Submitter>,
    input: Mutex<String>,
    debouncer: Debouncer<String>,
}

impl SentimentController {
    /// Controller for a loaded page, scoring over HTTP.
    pub fn init(
        context: &PageContext,
        settings: &AppSettings,
        sink: Arc<dyn VisualizationSink>,
    ) -> Self {
        let api = Arc::new(HttpScoreClient::new(context));
        Self::with_api(api, sink, settings)
    }

    pub fn with_api(
        api: Arc<dyn ScoreApi>,
        sink: Arc<dyn VisualizationSink>,
        settings: &AppSettings,
    ) -> Self {
        sink.setup();

        let submitter = Arc::new(Submitter {
            api,
            sink,
            max_text_length: settings.max_text_length,
            in_flight: Arc::new(AtomicUsize::new(0)),
        });

        let debounced = submitter.clone();
        let debouncer = Debouncer::new(settings.debounce(), move |text: String| {
            let submitter = debounced.clone();
            // Entered on the timer task, before the submission task is spawned,
            // so `is_busy` never reads false in between
            let in_flight = InFlight::enter(&submitter.in_flight);
            async move {
                submitter.send(&text).await;
                drop(in_flight);
            }
        });

        info!("Sentiment analysis page loaded");

        Self {
            submitter,
            input: Mutex::new(String::new()),
            debouncer,
        }
    }

    /// The input field changed. Submission waits for typing to settle.
    pub fn on_input(&self, text: impl Into<String>) {
        let text = text.into();
        *self.lock_input() = text.clone();
        self.debouncer.call(text);
    }

    /// An example button was clicked: its label replaces the input and is
    /// submitted right away.
    pub async fn on_button_click(&self, label: &str) -> SubmitOutcome {
        *self.lock_input() = label.to_string();
        self.submitter.submit(label).await
    }

    /// Score `text` now, bypassing the debounce window.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        self.submitter.submit(text).await
    }

    pub fn input_value(&self) -> String {
        self.lock_input().clone()
    }

    /// Whether a debounced submission is still waiting.
    pub fn has_pending_submission(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Whether anything is waiting or still on the wire.
    pub fn is_busy(&self) -> bool {
        self.has_pending_submission() || self.submitter.in_flight.load(Ordering::SeqCst) > 0
    }

    fn lock_input(&self) -> MutexGuard<'_, String> {
        self.input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
