//! Chat pipeline orchestration
//!
//! A run moves through
//! `ReceivedQuery → SentimentDone → ReplyDone → AudioDone [→ TranscodeDone → LipSyncDone]`.
//! Every transition needs the previous stage's output, so the first stage
//! that produces nothing ends the run with a [`PipelineError`] naming it, and
//! no later stage is invoked. There are no partial results.

mod stage;

pub use stage::{PipelineError, Stage, StageFailure};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::Result;
use crate::config::Config;
use crate::media::{AudioTranscoder, FfmpegTranscoder, LipSyncExtractor, RhubarbExtractor};
use crate::services::{
    ResponseClient, ResponseGenerator, SentimentAnalyzer, SentimentClient, SpeechClient,
    SpeechSynthesizer, build_http_client,
};

/// A non-empty user query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Wrap `text`, rejecting the empty string
    ///
    /// Whitespace is passed through untouched.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful end state of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Label from the sentiment stage
    pub sentiment: String,
    /// Generated reply
    pub response_text: String,
    /// Compressed TTS audio, or the transcoded WAV when media stages are enabled
    pub audio: Vec<u8>,
    /// Lip-sync tool output, present only when media stages are enabled
    pub lip_sync: Option<String>,
}

/// Transcode + lip-sync stages
#[derive(Clone)]
pub struct MediaStages {
    pub transcoder: Arc<dyn AudioTranscoder>,
    pub lip_sync: Arc<dyn LipSyncExtractor>,
}

/// Sequences the upstream calls and media tools for one query
#[derive(Clone)]
pub struct Pipeline {
    sentiment: Arc<dyn SentimentAnalyzer>,
    responder: Arc<dyn ResponseGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    media: Option<MediaStages>,
}

impl Pipeline {
    /// Create a pipeline without media post-processing
    #[must_use]
    pub fn new(
        sentiment: Arc<dyn SentimentAnalyzer>,
        responder: Arc<dyn ResponseGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            sentiment,
            responder,
            speech,
            media: None,
        }
    }

    /// Add the transcode and lip-sync stages
    #[must_use]
    pub fn with_media(
        mut self,
        transcoder: Arc<dyn AudioTranscoder>,
        lip_sync: Arc<dyn LipSyncExtractor>,
    ) -> Self {
        self.media = Some(MediaStages {
            transcoder,
            lip_sync,
        });
        self
    }

    /// Build the HTTP clients and, if enabled, the media tools from config
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = build_http_client(&config.services)?;

        let pipeline = Self::new(
            Arc::new(SentimentClient::new(http.clone(), &config.services.sentiment_url)),
            Arc::new(ResponseClient::new(http.clone(), &config.services.response_url)),
            Arc::new(SpeechClient::new(http, &config.services.tts_url)),
        );

        if config.media.enabled {
            return Ok(pipeline.with_media(
                Arc::new(FfmpegTranscoder::from_config(&config.media)),
                Arc::new(RhubarbExtractor::from_config(&config.media)),
            ));
        }

        Ok(pipeline)
    }

    /// Whether transcode and lip-sync stages run
    #[must_use]
    pub const fn media_enabled(&self) -> bool {
        self.media.is_some()
    }

    /// Run every stage in order for `query`
    ///
    /// # Errors
    ///
    /// Returns the first stage that failed together with its cause
    pub async fn run(&self, query: &Query) -> std::result::Result<ChatOutcome, PipelineError> {
        let sentiment = run_stage(Stage::Sentiment, self.sentiment.analyze(query.as_str())).await?;
        tracing::debug!(sentiment = %sentiment, "sentiment done");

        let response_text = run_stage(
            Stage::Response,
            self.responder.generate(query.as_str(), &sentiment),
        )
        .await?;
        tracing::debug!(chars = response_text.chars().count(), "reply done");

        let audio = run_stage(Stage::Speech, self.speech.synthesize(&response_text)).await?;
        tracing::debug!(bytes = audio.len(), "audio done");

        let Some(media) = &self.media else {
            return Ok(ChatOutcome {
                sentiment,
                response_text,
                audio,
                lip_sync: None,
            });
        };

        let wav = run_stage(Stage::Transcode, media.transcoder.to_wav(&audio)).await?;
        tracing::debug!(bytes = wav.len(), "transcode done");

        let lip_sync = run_stage(Stage::LipSync, media.lip_sync.extract(&wav)).await?;
        tracing::debug!(chars = lip_sync.len(), "lip sync done");

        Ok(ChatOutcome {
            sentiment,
            response_text,
            audio: wav,
            lip_sync: Some(lip_sync),
        })
    }
}

/// Await one stage, timing it and tagging a failure with the stage
async fn run_stage<T, F>(stage: Stage, fut: F) -> std::result::Result<T, PipelineError>
where
    F: Future<Output = std::result::Result<T, StageFailure>>,
{
    let started = Instant::now();
    let result = fut.await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(value) => {
            tracing::info!(stage = %stage, elapsed_ms, "stage complete");
            Ok(value)
        }
        Err(failure) => {
            tracing::warn!(stage = %stage, elapsed_ms, error = %failure, "stage failed");
            Err(PipelineError::new(stage, failure))
        }
    }
}
