//! Shared test utilities

#![allow(dead_code)]

#[cfg(unix)]
pub mod tools;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use avatar_gateway::api::ApiServerBuilder;
use avatar_gateway::config::MediaConfig;
use avatar_gateway::{
    AudioTranscoder, LipSyncExtractor, Pipeline, ResponseGenerator, SentimentAnalyzer,
    SpeechSynthesizer, StageFailure,
};
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;

pub const SENTIMENT: &str = "positive";
pub const REPLY: &str = "Glad you love it!";
pub const MP3: &[u8] = &[0xFF, 0xFB, 0x90, 0x64, 0x00, 0x0F, 0xF0, 0x00];
pub const WAV: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt ";
pub const CUES: &str = r#"{"mouthCues":[{"start":0.00,"end":0.12,"value":"B"}]}"#;

/// One recorded call into a stage double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Sentiment(String),
    Response { query: String, sentiment: String },
    Speech(String),
    Transcode(Vec<u8>),
    LipSync(Vec<u8>),
}

/// Ordered log shared by all doubles of one pipeline
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

struct FakeSentiment(CallLog, Result<String, StageFailure>);
struct FakeResponder(CallLog, Result<String, StageFailure>);
struct FakeSpeech(CallLog, Result<Vec<u8>, StageFailure>);
struct FakeTranscoder(CallLog, Result<Vec<u8>, StageFailure>);
struct FakeLipSync(CallLog, Result<String, StageFailure>);

#[async_trait]
impl SentimentAnalyzer for FakeSentiment {
    async fn analyze(&self, query: &str) -> Result<String, StageFailure> {
        self.0.push(Call::Sentiment(query.to_string()));
        self.1.clone()
    }
}

#[async_trait]
impl ResponseGenerator for FakeResponder {
    async fn generate(&self, query: &str, sentiment: &str) -> Result<String, StageFailure> {
        self.0.push(Call::Response {
            query: query.to_string(),
            sentiment: sentiment.to_string(),
        });
        self.1.clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, StageFailure> {
        self.0.push(Call::Speech(text.to_string()));
        self.1.clone()
    }
}

#[async_trait]
impl AudioTranscoder for FakeTranscoder {
    async fn to_wav(&self, audio: &[u8]) -> Result<Vec<u8>, StageFailure> {
        self.0.push(Call::Transcode(audio.to_vec()));
        self.1.clone()
    }
}

#[async_trait]
impl LipSyncExtractor for FakeLipSync {
    async fn extract(&self, wav: &[u8]) -> Result<String, StageFailure> {
        self.0.push(Call::LipSync(wav.to_vec()));
        self.1.clone()
    }
}

/// Canned results for every stage; defaults all succeed
pub struct Fakes {
    pub log: CallLog,
    pub sentiment: Result<String, StageFailure>,
    pub reply: Result<String, StageFailure>,
    pub audio: Result<Vec<u8>, StageFailure>,
    pub wav: Result<Vec<u8>, StageFailure>,
    pub lip_sync: Result<String, StageFailure>,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            sentiment: Ok(SENTIMENT.to_string()),
            reply: Ok(REPLY.to_string()),
            audio: Ok(MP3.to_vec()),
            wav: Ok(WAV.to_vec()),
            lip_sync: Ok(CUES.to_string()),
        }
    }
}

impl Fakes {
    /// Pipeline without media stages
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::new(FakeSentiment(self.log.clone(), self.sentiment.clone())),
            Arc::new(FakeResponder(self.log.clone(), self.reply.clone())),
            Arc::new(FakeSpeech(self.log.clone(), self.audio.clone())),
        )
    }

    /// Pipeline with transcode and lip-sync stages
    pub fn media_pipeline(&self) -> Pipeline {
        self.pipeline().with_media(
            Arc::new(FakeTranscoder(self.log.clone(), self.wav.clone())),
            Arc::new(FakeLipSync(self.log.clone(), self.lip_sync.clone())),
        )
    }
}

/// A failure value for tests that only care about the stage
pub fn unavailable() -> StageFailure {
    StageFailure::Network("connection refused".to_string())
}

/// Build the full API router around a pipeline
pub fn router(pipeline: Pipeline) -> axum::Router {
    ApiServerBuilder::new(Arc::new(pipeline), 0).build().router()
}

/// Build the router with explicit media config and rate limit
pub fn router_with(
    pipeline: Pipeline,
    media: &MediaConfig,
    rate_limit: Option<u32>,
) -> axum::Router {
    ApiServerBuilder::new(Arc::new(pipeline), 0)
        .media_config(media)
        .rate_limit(rate_limit)
        .build()
        .router()
}

/// POST a raw JSON body to `/chat` and decode the JSON reply
pub async fn post_chat(app: axum::Router, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// GET a path and decode the JSON reply
pub async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Decode the `audio_data` hex field
pub fn audio_bytes(json: &serde_json::Value) -> Vec<u8> {
    hex::decode(json["audio_data"].as_str().expect("audio_data is a string"))
        .expect("audio_data is valid hex")
}
