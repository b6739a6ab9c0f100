use super::transcript::{RecognitionAlternative, RecognitionResult};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Session options. The listener always asks for continuous interim results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub continuous: bool,
    pub interim_results: bool,
    pub lang: Option<String>,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            lang: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    #[error("microphone permission denied")]
    NotAllowed,
    #[error("no audio capture device")]
    AudioCapture,
    #[error("recognition service unreachable")]
    Network,
    #[error("no speech detected")]
    NoSpeech,
    #[error("recognition aborted")]
    Aborted,
    #[error("recognition error: {0}")]
    Other(String),
}

impl RecognitionError {
    /// Parse a recognition error code such as `"not-allowed"`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "not-allowed" | "service-not-allowed" => RecognitionError::NotAllowed,
            "audio-capture" => RecognitionError::AudioCapture,
            "network" => RecognitionError::Network,
            "no-speech" => RecognitionError::NoSpeech,
            "aborted" => RecognitionError::Aborted,
            other => RecognitionError::Other(other.to_string()),
        }
    }

    /// Errors that will keep happening until a person fixes something.
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            RecognitionError::NotAllowed | RecognitionError::AudioCapture
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The full result list for the session so far.
    Result(Vec<RecognitionResult>),
    Error(RecognitionError),
    /// The session is over; a new one needs `start`.
    End,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireEvent {
    Result(Vec<Vec<RecognitionAlternative>>),
    Error(String),
    End(bool),
}

impl RecognitionEvent {
    /// Parse one JSON event line:
    /// `{"result": [[{"transcript": "..."}]]}`, `{"error": "network"}` or `{"end": true}`.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        let event = match serde_json::from_str::<WireEvent>(line)? {
            WireEvent::Result(results) => RecognitionEvent::Result(
                results
                    .into_iter()
                    .map(|alternatives| RecognitionResult { alternatives })
                    .collect(),
            ),
            WireEvent::Error(code) => RecognitionEvent::Error(RecognitionError::from_code(&code)),
            WireEvent::End(_) => RecognitionEvent::End,
        };
        Ok(event)
    }
}

/// A continuous speech recognition engine.
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Begin a new session.
    async fn start(&mut self, options: &RecognitionOptions) -> Result<(), RecognitionError>;

    /// Next event of the current session. `None` once the engine is gone for good.
    async fn next_event(&mut self) -> Option<RecognitionEvent>;
}

/// Recognizer fed from a channel, for piping events in from elsewhere.
pub struct ChannelRecognizer {
    events: mpsc::Receiver<RecognitionEvent>,
    starts: u32,
    last_options: Option<RecognitionOptions>,
}

impl ChannelRecognizer {
    pub fn new(events: mpsc::Receiver<RecognitionEvent>) -> Self {
        Self {
            events,
            starts: 0,
            last_options: None,
        }
    }

    /// Recognizer plus the sender that feeds it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<RecognitionEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn last_options(&self) -> Option<&RecognitionOptions> {
        self.last_options.as_ref()
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn start(&mut self, options: &RecognitionOptions) -> Result<(), RecognitionError> {
        self.starts += 1;
        self.last_options = Some(options.clone());
        debug!("ChannelRecognizer: session {} started", self.starts);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<RecognitionEvent> {
        self.events.recv().await
    }
}
