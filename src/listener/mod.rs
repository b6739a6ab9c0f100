//! Microphone listener.
//!
//! Keeps a continuous recognition session running and forwards every result
//! list to the transcript port as animation-ready records. When a session
//! ends it is restarted according to the [`RestartPolicy`].

mod port;
mod recognizer;
mod supervisor;
mod transcript;

pub use port::{ChannelPort, JsonLinesPort, PortError, TranscriptPort, NEW_TRANSCRIPT_PORT};
pub use recognizer::{
    ChannelRecognizer, RecognitionError, RecognitionEvent, RecognitionOptions, SpeechRecognizer,
};
pub use supervisor::{ListenerState, RestartPolicy, StopReason, Supervisor};
pub use transcript::{
    build_transcripts, RecognitionAlternative, RecognitionResult, TranscriptRecord,
};

use crate::bootstrap::PageContext;
use crate::settings::AppSettings;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::watch;

pub struct MicrophoneListener<R: SpeechRecognizer> {
    recognizer: R,
    port: Arc<dyn TranscriptPort>,
    keyword: Regex,
    options: RecognitionOptions,
    supervisor: Supervisor,
}

impl<R: SpeechRecognizer> MicrophoneListener<R> {
    /// Listener for a loaded page.
    pub fn init(
        context: &PageContext,
        settings: &AppSettings,
        recognizer: R,
        port: Arc<dyn TranscriptPort>,
    ) -> Result<Self> {
        debug!(
            "MicrophoneListener: attached to page {} (port {})",
            context.base_url(),
            port.name()
        );
        let keyword = Regex::new(&settings.fire_keyword)
            .with_context(|| format!("Invalid keyword pattern '{}'", settings.fire_keyword))?;
        let options = RecognitionOptions {
            lang: settings.recognition_lang.clone(),
            ..RecognitionOptions::default()
        };
        Ok(Self::new(
            recognizer,
            port,
            keyword,
            RestartPolicy::from_settings(settings),
        )
        .with_options(options))
    }

    pub fn new(
        recognizer: R,
        port: Arc<dyn TranscriptPort>,
        keyword: Regex,
        policy: RestartPolicy,
    ) -> Self {
        Self {
            recognizer,
            port,
            keyword,
            options: RecognitionOptions::default(),
            supervisor: Supervisor::new(policy),
        }
    }

    pub fn with_options(mut self, options: RecognitionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.supervisor.subscribe()
    }

    pub fn state(&self) -> ListenerState {
        self.supervisor.state()
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Listen until the supervisor stops the loop, then report why.
    pub async fn run(&mut self) -> StopReason {
        loop {
            match self.recognizer.start(&self.options).await {
                Ok(()) => {
                    self.supervisor.on_started();
                    debug!("MicrophoneListener: session started");
                    if let Some(reason) = self.listen_session().await {
                        return reason;
                    }
                }
                Err(e) => {
                    warn!("MicrophoneListener: failed to start recognition: {}", e);
                    if let ListenerState::Stopped(reason) = self.supervisor.on_start_failed(&e)
                    {
                        return reason;
                    }
                }
            }

            match self.supervisor.on_end() {
                Some(delay) => {
                    info!("MicrophoneListener: resetting");
                    if delay.is_zero() {
                        // A recognizer that fails or ends without awaiting would
                        // otherwise never hand the worker back
                        tokio::task::yield_now().await;
                    } else {
                        debug!("MicrophoneListener: waiting {:?} before restart", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
                None => return self.stop_reason(StopReason::SourceClosed),
            }
        }
    }

    /// Drain one session. `Some` means the listener has stopped.
    async fn listen_session(&mut self) -> Option<StopReason> {
        loop {
            let event = match self.recognizer.next_event().await {
                Some(event) => event,
                None => {
                    info!("MicrophoneListener: recognizer closed");
                    self.supervisor.stop(StopReason::SourceClosed);
                    return Some(self.stop_reason(StopReason::SourceClosed));
                }
            };

            match event {
                RecognitionEvent::Result(results) => {
                    let now = chrono::Utc::now().timestamp_millis();
                    let transcripts = build_transcripts(&results, now, &self.keyword);
                    debug!("MicrophoneListener: {:?}", transcripts);

                    if let Err(e) = self.port.send(transcripts) {
                        warn!("MicrophoneListener: {}", e);
                        self.supervisor.stop(StopReason::PortClosed);
                        return Some(self.stop_reason(StopReason::PortClosed));
                    }
                    self.supervisor.on_result();
                }
                RecognitionEvent::Error(e) => {
                    warn!("MicrophoneListener: recognition error: {}", e);
                    if let ListenerState::Stopped(reason) = self.supervisor.on_error(&e) {
                        return Some(reason);
                    }
                }
                RecognitionEvent::End => return None,
            }
        }
    }

    fn stop_reason(&self, fallback: StopReason) -> StopReason {
        match self.supervisor.state() {
            ListenerState::Stopped(reason) => reason,
            _ => fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Backoff;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Recognizer whose sessions never start.
    struct BrokenRecognizer {
        error: RecognitionError,
        starts: u32,
    }

    impl BrokenRecognizer {
        fn new(error: RecognitionError) -> Self {
            Self { error, starts: 0 }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for BrokenRecognizer {
        async fn start(&mut self, _options: &RecognitionOptions) -> Result<(), RecognitionError> {
            self.starts += 1;
            Err(self.error.clone())
        }

        async fn next_event(&mut self) -> Option<RecognitionEvent> {
            None
        }
    }

    fn broken_listener(
        error: RecognitionError,
        policy: RestartPolicy,
    ) -> MicrophoneListener<BrokenRecognizer> {
        let (port, _transcripts) = ChannelPort::channel();
        MicrophoneListener::new(
            BrokenRecognizer::new(error),
            Arc::new(port),
            Regex::new("fire").unwrap(),
            policy,
        )
    }

    fn listener(
        policy: RestartPolicy,
    ) -> (
        mpsc::Sender<RecognitionEvent>,
        mpsc::UnboundedReceiver<Vec<TranscriptRecord>>,
        MicrophoneListener<ChannelRecognizer>,
    ) {
        let (events, recognizer) = ChannelRecognizer::channel(64);
        let (port, transcripts) = ChannelPort::channel();
        let listener = MicrophoneListener::new(
            recognizer,
            Arc::new(port),
            Regex::new("fire").unwrap(),
            policy,
        );
        (events, transcripts, listener)
    }

    fn results(texts: &[&str]) -> RecognitionEvent {
        RecognitionEvent::Result(texts.iter().map(|t| RecognitionResult::new(*t)).collect())
    }

    #[tokio::test]
    async fn test_forwards_results_and_restarts_on_end() {
        let (events, mut transcripts, mut listener) = listener(RestartPolicy::default());

        events.send(results(&["hello"])).await.unwrap();
        events.send(RecognitionEvent::End).await.unwrap();
        events.send(results(&["hello", "fire now"])).await.unwrap();
        events.send(RecognitionEvent::End).await.unwrap();
        drop(events);

        assert_eq!(listener.run().await, StopReason::SourceClosed);
        // Started, restarted twice, found the source gone.
        assert_eq!(listener.recognizer().starts(), 3);
        assert!(listener.recognizer().last_options().unwrap().interim_results);

        let first = transcripts.recv().await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(!first[0].fire);

        let second = transcripts.recv().await.unwrap();
        assert_eq!(second.len(), 2);
        assert!(second[1].fire);
        assert_eq!(second[0].time, second[1].time);
    }

    #[tokio::test]
    async fn test_breaker_stops_persistent_failures() {
        let (events, _transcripts, mut listener) = listener(RestartPolicy {
            backoff: Backoff::None,
            max_consecutive_failures: Some(2),
        });
        let state = listener.subscribe();

        for _ in 0..5 {
            events
                .send(RecognitionEvent::Error(RecognitionError::NotAllowed))
                .await
                .unwrap();
            events.send(RecognitionEvent::End).await.unwrap();
        }

        let reason = listener.run().await;
        assert_eq!(reason, StopReason::CircuitOpen { failures: 2 });
        assert_eq!(listener.recognizer().starts(), 2);
        assert_eq!(*state.borrow(), ListenerState::Stopped(reason));
    }

    #[tokio::test]
    async fn test_closed_port_stops_listener() {
        let (events, transcripts, mut listener) = listener(RestartPolicy::unbounded());
        drop(transcripts);

        events.send(results(&["hello"])).await.unwrap();
        assert_eq!(listener.run().await, StopReason::PortClosed);
        assert_eq!(listener.recognizer().starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_restart() {
        let (events, _transcripts, mut listener) = listener(RestartPolicy {
            backoff: Backoff::Fixed { delay_ms: 1_000 },
            max_consecutive_failures: None,
        });
        let mut state = listener.subscribe();

        let handle = tokio::spawn(async move {
            let reason = listener.run().await;
            (reason, listener.recognizer().starts())
        });

        events.send(RecognitionEvent::End).await.unwrap();
        state
            .wait_for(|s| matches!(s, ListenerState::Restarting { .. }))
            .await
            .unwrap();

        let started = tokio::time::Instant::now();
        state
            .wait_for(|s| *s == ListenerState::Listening)
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1_000));

        drop(events);
        let (reason, starts) = handle.await.unwrap();
        assert_eq!(reason, StopReason::SourceClosed);
        assert_eq!(starts, 2);
    }

    #[tokio::test]
    async fn test_start_failures_trip_breaker() {
        let mut listener = broken_listener(RecognitionError::Network, RestartPolicy::default());
        assert_eq!(
            listener.run().await,
            StopReason::CircuitOpen { failures: 5 }
        );
        assert_eq!(listener.recognizer().starts, 5);
    }

    #[tokio::test]
    async fn test_immediate_restarts_yield_to_runtime() {
        let mut listener = broken_listener(RecognitionError::Network, RestartPolicy::unbounded());

        // Never stops on its own, so the timeout has to get a chance to fire.
        let result = tokio::time::timeout(Duration::from_millis(20), listener.run()).await;
        assert!(result.is_err());
        assert!(listener.recognizer().starts > 0);
    }

    #[tokio::test]
    async fn test_init_passes_language_to_recognizer() {
        use crate::bootstrap::Page;
        use crate::settings::get_default_settings;

        let mut settings = get_default_settings();
        settings.recognition_lang = Some("en-GB".to_string());
        let page = Page::new(settings);
        let (events, recognizer) = ChannelRecognizer::channel(1);
        let (port, _rx) = ChannelPort::channel();
        let mut listener = MicrophoneListener::init(
            page.content_loaded().unwrap(),
            page.settings(),
            recognizer,
            Arc::new(port),
        )
        .unwrap();
        drop(events);

        assert_eq!(listener.run().await, StopReason::SourceClosed);
        let options = listener.recognizer().last_options().unwrap();
        assert_eq!(options.lang.as_deref(), Some("en-GB"));
        assert!(options.continuous);
    }

    #[test]
    fn test_init_uses_page_settings() {
        use crate::bootstrap::Page;
        use crate::settings::get_default_settings;

        let mut settings = get_default_settings();
        settings.fire_keyword = "(".to_string();
        let page = Page::new(settings);
        let (_events, recognizer) = ChannelRecognizer::channel(1);
        let (port, _rx) = ChannelPort::channel();
        let result = MicrophoneListener::init(
            page.content_loaded().unwrap(),
            page.settings(),
            recognizer,
            Arc::new(port),
        );
        assert!(result.is_err());

        let page = Page::new(get_default_settings());
        let (_events, recognizer) = ChannelRecognizer::channel(1);
        let (port, _rx) = ChannelPort::channel();
        let listener = MicrophoneListener::init(
            page.content_loaded().unwrap(),
            page.settings(),
            recognizer,
            Arc::new(port),
        )
        .unwrap();
        assert_eq!(listener.state(), ListenerState::Idle);
    }
}
