//! Clients for the upstream HTTP services
//!
//! Each client wraps a single `POST` to a configured base URL. Failures never
//! escape as foreign errors: transport problems, non-2xx statuses and
//! unusable bodies all become a tagged [`StageFailure`].

mod responder;
mod sentiment;
mod tts;

pub use responder::ResponseClient;
pub use sentiment::SentimentClient;
pub use tts::SpeechClient;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ServiceConfig;
use crate::pipeline::StageFailure;
use crate::Result;

/// Classifies the emotional tone of a query
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Return a sentiment label for `query`
    async fn analyze(&self, query: &str) -> std::result::Result<String, StageFailure>;
}

/// Generates a reply for a query in a given emotional register
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Return reply text for `query` given its `sentiment`
    async fn generate(
        &self,
        query: &str,
        sentiment: &str,
    ) -> std::result::Result<String, StageFailure>;
}

/// Turns reply text into compressed audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Return the raw audio bytes for `text`
    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, StageFailure>;
}

/// Build the shared HTTP client used by every upstream call
///
/// # Errors
///
/// Returns `Error::Http` if the TLS backend cannot be initialized
pub fn build_http_client(config: &ServiceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(concat!("avatar-gateway/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Join a base URL and a path without doubling slashes
fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// POST a JSON body and return the response if its status is 2xx
async fn post_json<B>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> std::result::Result<reqwest::Response, StageFailure>
where
    B: Serialize + ?Sized + Sync,
{
    let response = client.post(url).json(body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StageFailure::status(status.as_u16(), &body));
    }

    Ok(response)
}

/// Decode a 2xx response body as JSON
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> std::result::Result<T, StageFailure> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| StageFailure::InvalidOutput(format!("malformed JSON body: {e}")))
}
