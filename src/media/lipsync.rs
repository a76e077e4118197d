//! Lip-sync metadata via Rhubarb

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{LipSyncExtractor, release_scratch, run_tool, scratch_dir};
use crate::config::MediaConfig;
use crate::pipeline::StageFailure;

/// Runs `rhubarb -f <format> -o <output> <input.wav> -r <recognizer>`
#[derive(Debug, Clone)]
pub struct RhubarbExtractor {
    program: PathBuf,
    format: String,
    recognizer: String,
    timeout: Duration,
    scratch_parent: Option<PathBuf>,
}

impl RhubarbExtractor {
    /// Create an extractor with the default `json` format and `phonetic` recognizer
    #[must_use]
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            format: "json".to_string(),
            recognizer: "phonetic".to_string(),
            timeout,
            scratch_parent: None,
        }
    }

    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(config.rhubarb_path.clone(), config.tool_timeout)
            .format(config.lip_sync_format.clone())
            .recognizer(config.recognizer.clone())
            .scratch_parent(config.scratch_dir.clone())
    }

    /// Export format passed as `-f`
    #[must_use]
    pub fn format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    /// Recognizer passed as `-r`
    #[must_use]
    pub fn recognizer(mut self, recognizer: String) -> Self {
        self.recognizer = recognizer;
        self
    }

    /// Create scratch directories under `parent` instead of the system temp dir
    #[must_use]
    pub fn scratch_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.scratch_parent = parent;
        self
    }

    async fn extract_in(&self, dir: &Path, wav: &[u8]) -> Result<String, StageFailure> {
        let input = dir.join("speech.wav");
        let output = dir.join(format!("lipsync.{}", self.format));

        tokio::fs::write(&input, wav).await?;

        let args = [
            OsStr::new("-f"),
            OsStr::new(&self.format),
            OsStr::new("-o"),
            output.as_os_str(),
            input.as_os_str(),
            OsStr::new("-r"),
            OsStr::new(&self.recognizer),
        ];
        run_tool(&self.program, args, self.timeout).await?;

        let bytes = tokio::fs::read(&output).await?;
        if bytes.is_empty() {
            return Err(StageFailure::InvalidOutput(
                "lip-sync tool produced an empty file".to_string(),
            ));
        }
        String::from_utf8(bytes)
            .map_err(|_| StageFailure::InvalidOutput("lip-sync output is not UTF-8".to_string()))
    }
}

#[async_trait]
impl LipSyncExtractor for RhubarbExtractor {
    async fn extract(&self, wav: &[u8]) -> Result<String, StageFailure> {
        let scratch = scratch_dir(self.scratch_parent.as_deref())?;
        let result = self.extract_in(scratch.path(), wav).await;
        release_scratch(scratch);
        result
    }
}
