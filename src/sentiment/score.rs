use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response from the scoring endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SentimentScore {
    /// Per-emoji score, 0..1 before normalization against the baseline.
    #[serde(default)]
    pub emoji: BTreeMap<String, f64>,
    /// Aggregate sentiment in 0..1.
    pub sentiment: f64,
}

impl SentimentScore {
    /// The `n` highest-scoring emoji, best first. Ties keep key order.
    pub fn top_emoji(&self, n: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .emoji
            .iter()
            .map(|(emoji, score)| (emoji.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}
