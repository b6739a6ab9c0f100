use super::score::SentimentScore;
use crate::utils::format_percentage;
use log::{debug, info};
use std::fmt::Write;
use std::sync::{Mutex, MutexGuard};

const TOP_EMOJI_COUNT: usize = 5;

/// Receives scores for display.
pub trait VisualizationSink: Send + Sync {
    /// Called once when the page controller is initialized.
    fn setup(&self) {}

    fn update(&self, score: &SentimentScore);
}

/// Logs every score it is handed.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl VisualizationSink for LoggingSink {
    fn update(&self, score: &SentimentScore) {
        info!("Sentiment data received: {:?}", score);
    }
}

/// Keeps the most recent score and renders it as text.
///
/// Responses are shown in the order they arrive, so a slow reply for older
/// input can replace a newer one.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    latest: Mutex<Option<SentimentScore>>,
    ready: Mutex<bool>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<SentimentScore> {
        lock(&self.latest).clone()
    }

    pub fn is_ready(&self) -> bool {
        *lock(&self.ready)
    }

    /// Text rendering of the latest score, or `None` before the first one.
    pub fn render(&self) -> Option<String> {
        lock(&self.latest).as_ref().map(render_score)
    }
}

impl VisualizationSink for ScoreBoard {
    fn setup(&self) {
        *lock(&self.ready) = true;
        debug!("ScoreBoard: visualization ready");
    }

    fn update(&self, score: &SentimentScore) {
        *lock(&self.latest) = Some(score.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn render_score(score: &SentimentScore) -> String {
    let mut out = format!("sentiment {}", format_percentage(score.sentiment));
    for (emoji, value) in score.top_emoji(TOP_EMOJI_COUNT) {
        let _ = write!(out, "\n  {} {}", emoji, format_percentage(value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn score(sentiment: f64, emoji: &[(&str, f64)]) -> SentimentScore {
        SentimentScore {
            emoji: emoji
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            sentiment,
        }
    }

    #[test]
    fn test_board_starts_empty() {
        let board = ScoreBoard::new();
        assert!(!board.is_ready());
        assert!(board.latest().is_none());
        assert!(board.render().is_none());

        board.setup();
        assert!(board.is_ready());
    }

    #[test]
    fn test_last_update_wins() {
        let board = ScoreBoard::new();
        board.update(&score(0.2, &[]));
        board.update(&score(0.7, &[]));
        assert_eq!(board.latest().unwrap().sentiment, 0.7);
    }

    #[test]
    fn test_render_lists_top_emoji() {
        let board = ScoreBoard::new();
        board.update(&score(0.8, &[("😊", 0.9), ("😢", 0.125)]));
        assert_eq!(
            board.render().unwrap(),
            "sentiment 80.0%\n  😊 90.0%\n  😢 12.5%"
        );
    }
}
