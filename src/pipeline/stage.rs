//! Pipeline stages and their tagged failure reasons

use std::fmt;

use thiserror::Error;

/// Longest upstream body or stderr excerpt kept in a failure
const EXCERPT_CHARS: usize = 200;

/// A step of the chat pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Sentiment analysis of the query
    Sentiment,
    /// Reply generation from query + sentiment
    Response,
    /// Text-to-speech of the reply
    Speech,
    /// Compressed audio to WAV
    Transcode,
    /// Phoneme/timing extraction from the WAV
    LipSync,
}

impl Stage {
    /// Machine-readable error code reported to clients
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Sentiment => "sentiment_failed",
            Self::Response => "response_failed",
            Self::Speech => "audio_failed",
            Self::Transcode => "transcode_failed",
            Self::LipSync => "lip_sync_failed",
        }
    }

    /// Static message reported to clients
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Sentiment => "Failed to analyze sentiment",
            Self::Response => "Failed to generate response",
            Self::Speech => "Failed to generate audio",
            Self::Transcode => "Failed to convert audio",
            Self::LipSync => "Failed to generate lip sync data",
        }
    }

    /// Short name used in logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sentiment => "sentiment",
            Self::Response => "response",
            Self::Speech => "speech",
            Self::Transcode => "transcode",
            Self::LipSync => "lip_sync",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a stage produced no output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFailure {
    /// Connection refused, DNS failure, reset, etc
    #[error("network error: {0}")]
    Network(String),

    /// Upstream call or tool exceeded its time budget
    #[error("timed out: {0}")]
    Timeout(String),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Upstream answered 2xx but without the expected field
    #[error("response missing `{0}`")]
    MissingField(&'static str),

    /// External tool could not be started
    #[error("failed to spawn {tool}: {message}")]
    ToolSpawn { tool: String, message: String },

    /// External tool exited unsuccessfully
    #[error("{tool} exited with code {code:?}: {stderr}")]
    ToolExit {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Scratch file I/O failed
    #[error("io error: {0}")]
    Io(String),

    /// Upstream body or tool output could not be used
    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

impl StageFailure {
    /// Build a `Status` failure, truncating the body
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: excerpt(body),
        }
    }

    /// Build a `ToolExit` failure, truncating stderr
    #[must_use]
    pub fn tool_exit(tool: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        Self::ToolExit {
            tool: tool.into(),
            code,
            stderr: excerpt(stderr),
        }
    }
}

impl From<reqwest::Error> for StageFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::InvalidOutput(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<std::io::Error> for StageFailure {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Terminal failed state of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {failure}")]
pub struct PipelineError {
    /// Stage that produced no output
    pub stage: Stage,
    /// Why it failed
    pub failure: StageFailure,
}

impl PipelineError {
    #[must_use]
    pub const fn new(stage: Stage, failure: StageFailure) -> Self {
        Self { stage, failure }
    }
}

/// Keep the first `EXCERPT_CHARS` characters of a diagnostic string
fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    out.push('…');
    out
}
