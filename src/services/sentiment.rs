//! Sentiment analysis client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{SentimentAnalyzer, endpoint, post_json, read_json};
use crate::pipeline::StageFailure;

/// Calls `POST {base}/analyze`
#[derive(Clone)]
pub struct SentimentClient {
    client: reqwest::Client,
    url: String,
}

impl SentimentClient {
    /// Create a client for the sentiment service at `base_url`
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, "analyze"),
        }
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    sentiment: Option<String>,
}

#[async_trait]
impl SentimentAnalyzer for SentimentClient {
    async fn analyze(&self, query: &str) -> Result<String, StageFailure> {
        let response = post_json(&self.client, &self.url, &AnalyzeRequest { query }).await?;
        let body: AnalyzeResponse = read_json(response).await?;
        body.sentiment.ok_or(StageFailure::MissingField("sentiment"))
    }
}
