//! Response generation client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ResponseGenerator, endpoint, post_json, read_json};
use crate::pipeline::StageFailure;

/// Calls `POST {base}/chat/generate-response`
#[derive(Clone)]
pub struct ResponseClient {
    client: reqwest::Client,
    url: String,
}

impl ResponseClient {
    /// Create a client for the response service at `base_url`
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, "chat/generate-response"),
        }
    }
}

/// The upstream calls the sentiment label `emotion`
#[derive(Serialize)]
struct GenerateRequest<'a> {
    query: &'a str,
    emotion: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[async_trait]
impl ResponseGenerator for ResponseClient {
    async fn generate(&self, query: &str, sentiment: &str) -> Result<String, StageFailure> {
        let request = GenerateRequest {
            query,
            emotion: sentiment,
        };
        let response = post_json(&self.client, &self.url, &request).await?;
        let body: GenerateResponse = read_json(response).await?;
        body.response.ok_or(StageFailure::MissingField("response"))
    }
}
