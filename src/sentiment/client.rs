use super::score::SentimentScore;
use crate::bootstrap::PageContext;
use async_trait::async_trait;
use log::debug;
use reqwest::multipart::Form;
use thiserror::Error;

pub const SCORE_ENDPOINT_PATH: &str = "/sentiment/api/score";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("score request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to parse score response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can score a piece of text.
#[async_trait]
pub trait ScoreApi: Send + Sync {
    async fn score(&self, text: &str) -> Result<SentimentScore, ScoreError>;
}

/// Posts text as a multipart form to the page's scoring endpoint.
#[derive(Debug, Clone)]
pub struct HttpScoreClient {
    client: reqwest::Client,
    url: String,
}

impl HttpScoreClient {
    pub fn new(context: &PageContext) -> Self {
        Self {
            client: context.http().clone(),
            url: context.url(SCORE_ENDPOINT_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ScoreApi for HttpScoreClient {
    async fn score(&self, text: &str) -> Result<SentimentScore, ScoreError> {
        debug!("Sending score request to: {}", self.url);

        let form = Form::new().text("text", text.to_string());
        let response = self.client.post(&self.url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ScoreError::Status { status, body });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
