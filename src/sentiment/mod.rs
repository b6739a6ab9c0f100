//! Sentiment analysis page.
//!
//! Text typed into the page (or picked from an example button) is posted to
//! the scoring endpoint and the returned scores drive the visualization.
//!
//! ```text
//!  on_input ──▶ Debouncer (500ms) ──┐
//!                                   ├──▶ submit ──▶ ScoreApi ──▶ VisualizationSink
//!  on_button_click ─────────────────┘
//! ```

mod client;
mod controller;
mod score;
mod visualization;

pub use client::{HttpScoreClient, ScoreApi, ScoreError, SCORE_ENDPOINT_PATH};
pub use controller::{SentimentController, SubmitOutcome};
pub use score::SentimentScore;
pub use visualization::{LoggingSink, ScoreBoard, VisualizationSink};
