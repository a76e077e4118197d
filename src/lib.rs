//! Avatar Gateway - turns a text query into a spoken, lip-synced reply
//!
//! One request flows through three upstream HTTP services and, optionally,
//! two local command-line tools:
//!
//! ```text
//! POST /chat {"query"}
//!      │
//!      ▼
//! ┌───────────┐   ┌──────────────┐   ┌─────────┐   ┌───────────┐   ┌──────────┐
//! │ sentiment │──▶│ reply (LLM)  │──▶│   TTS   │──▶│  ffmpeg   │──▶│ rhubarb  │
//! │  /analyze │   │ /chat/gen... │   │/generate│   │  → WAV    │   │ → cues   │
//! └───────────┘   └──────────────┘   └─────────┘   └───────────┘   └──────────┘
//!                                                   └──── media stages (optional) ───┘
//! ```
//!
//! The first stage that fails ends the request with a stage-specific error;
//! no partial results are returned.

pub mod api;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod services;

pub use config::Config;
pub use error::{Error, Result};
pub use media::{AudioTranscoder, FfmpegTranscoder, LipSyncExtractor, RhubarbExtractor};
pub use pipeline::{ChatOutcome, Pipeline, PipelineError, Query, Stage, StageFailure};
pub use services::{
    ResponseClient, ResponseGenerator, SentimentAnalyzer, SentimentClient, SpeechClient,
    SpeechSynthesizer,
};
