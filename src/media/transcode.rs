//! Compressed audio to WAV via ffmpeg

use std::ffi::OsStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{AudioTranscoder, release_scratch, run_tool, scratch_dir};
use crate::config::MediaConfig;
use crate::pipeline::StageFailure;

/// Runs `ffmpeg -y -loglevel error -i <input> <output.wav>`
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Duration,
    scratch_parent: Option<PathBuf>,
}

impl FfmpegTranscoder {
    #[must_use]
    pub const fn new(program: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            timeout,
            scratch_parent: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.tool_timeout)
            .scratch_parent(config.scratch_dir.clone())
    }

    /// Create scratch directories under `parent` instead of the system temp dir
    #[must_use]
    pub fn scratch_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.scratch_parent = parent;
        self
    }

    async fn convert_in(&self, dir: &Path, audio: &[u8]) -> Result<Vec<u8>, StageFailure> {
        let input = dir.join("speech.mp3");
        let output = dir.join("speech.wav");

        tokio::fs::write(&input, audio).await?;

        let args = [
            OsStr::new("-y"),
            OsStr::new("-loglevel"),
            OsStr::new("error"),
            OsStr::new("-i"),
            input.as_os_str(),
            output.as_os_str(),
        ];
        run_tool(&self.program, args, self.timeout).await?;

        let wav = tokio::fs::read(&output).await?;
        check_wav(&wav)?;
        Ok(wav)
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn to_wav(&self, audio: &[u8]) -> Result<Vec<u8>, StageFailure> {
        let scratch = scratch_dir(self.scratch_parent.as_deref())?;
        let result = self.convert_in(scratch.path(), audio).await;
        release_scratch(scratch);
        result
    }
}

/// Reject empty or unparseable output so a truncated file never reaches clients
fn check_wav(wav: &[u8]) -> Result<(), StageFailure> {
    if wav.is_empty() {
        return Err(StageFailure::InvalidOutput(
            "transcoder produced an empty file".to_string(),
        ));
    }

    let reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| StageFailure::InvalidOutput(format!("transcoder output is not WAV: {e}")))?;

    let spec = reader.spec();
    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        frames = reader.duration(),
        "transcoded audio"
    );
    Ok(())
}
