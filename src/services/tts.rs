//! Text-to-speech client

use async_trait::async_trait;
use serde::Serialize;

use super::{SpeechSynthesizer, endpoint, post_json};
use crate::pipeline::StageFailure;

/// Calls `POST {base}/generate` and returns the body as opaque audio
#[derive(Clone)]
pub struct SpeechClient {
    client: reqwest::Client,
    url: String,
}

impl SpeechClient {
    /// Create a client for the TTS service at `base_url`
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: endpoint(base_url, "generate"),
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, StageFailure> {
        let response = post_json(&self.client, &self.url, &SpeechRequest { text }).await?;
        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
