use regex::Regex;
use serde::{Deserialize, Serialize};

/// Starting vertical offset for a freshly captured transcript.
pub const INITIAL_Y: f64 = 0.0;
/// Starting opacity for a freshly captured transcript.
pub const INITIAL_OPACITY: f64 = 1.0;

/// One recognition hypothesis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecognitionAlternative {
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// One entry of a result list, best alternative first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    pub alternatives: Vec<RecognitionAlternative>,
}

impl RecognitionResult {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            alternatives: vec![RecognitionAlternative {
                transcript: transcript.into(),
                confidence: None,
            }],
        }
    }

    pub fn best(&self) -> Option<&RecognitionAlternative> {
        self.alternatives.first()
    }
}

/// What the consumer on the other side of the port animates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TranscriptRecord {
    pub text: String,
    /// Capture time, milliseconds since the Unix epoch.
    pub time: i64,
    pub y: f64,
    #[serde(rename = "op")]
    pub opacity: f64,
    pub fire: bool,
}

/// Turn a result list into transcript records stamped with `now_ms`.
///
/// Uses the best alternative of each result; results with none are dropped.
pub fn build_transcripts(
    results: &[RecognitionResult],
    now_ms: i64,
    keyword: &Regex,
) -> Vec<TranscriptRecord> {
    results
        .iter()
        .filter_map(RecognitionResult::best)
        .map(|alternative| TranscriptRecord {
            fire: keyword.is_match(&alternative.transcript),
            text: alternative.transcript.clone(),
            time: now_ms,
            y: INITIAL_Y,
            opacity: INITIAL_OPACITY,
        })
        .collect()
}
