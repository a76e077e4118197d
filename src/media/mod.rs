//! Local audio post-processing via external command-line tools
//!
//! Both stages work the same way: write the input into a per-invocation
//! scratch directory, run the tool under a timeout, read its output back and
//! drop the directory. The directory is removed on every exit path, including
//! cancellation of the surrounding request future.

mod lipsync;
mod transcode;

pub use lipsync::RhubarbExtractor;
pub use transcode::FfmpegTranscoder;

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::pipeline::StageFailure;

/// Most stderr kept from one tool run
const STDERR_CAP: u64 = 16 * 1024;

/// Converts compressed speech audio to an uncompressed WAV
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Return WAV bytes for the compressed `audio`
    async fn to_wav(&self, audio: &[u8]) -> Result<Vec<u8>, StageFailure>;
}

/// Derives mouth-shape timing metadata from a WAV
#[async_trait]
pub trait LipSyncExtractor: Send + Sync {
    /// Return the tool's structured text output for `wav`
    async fn extract(&self, wav: &[u8]) -> Result<String, StageFailure>;
}

/// Create a uniquely named scratch directory under `parent` (or the system temp dir)
fn scratch_dir(parent: Option<&Path>) -> Result<TempDir, StageFailure> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("avatar-");
    let dir = match parent {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Remove a scratch directory, logging instead of failing the stage
fn release_scratch(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(e) = dir.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch directory");
    }
}

/// Run an external tool to completion
///
/// stdout is discarded; at most `STDERR_CAP` bytes of stderr are kept for the
/// failure report. The child is killed if `timeout` elapses.
async fn run_tool<I, S>(program: &Path, args: I, timeout: Duration) -> Result<(), StageFailure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = program.display().to_string();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| StageFailure::ToolSpawn {
            tool: tool.clone(),
            message: e.to_string(),
        })?;

    let stderr = child.stderr.take();
    let finished = async move {
        let (status, stderr) = tokio::join!(child.wait(), read_capped(stderr, STDERR_CAP));
        status.map(|status| (status, stderr))
    };

    let (status, stderr) = tokio::time::timeout(timeout, finished)
        .await
        .map_err(|_| StageFailure::Timeout(format!("{tool} after {timeout:?}")))??;

    let stderr = String::from_utf8_lossy(&stderr);
    if !stderr.trim().is_empty() {
        tracing::debug!(tool = %tool, stderr = %stderr, "tool stderr");
    }

    if !status.success() {
        return Err(StageFailure::tool_exit(tool, status.code(), &stderr));
    }

    Ok(())
}

/// Keep the first `cap` bytes of `stream` and drain the rest so the writer never blocks
async fn read_capped<R>(stream: Option<R>, cap: u64) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(stream) = stream else {
        return kept;
    };

    let mut head = stream.take(cap);
    if let Err(e) = head.read_to_end(&mut kept).await {
        tracing::debug!(error = %e, "failed to read tool stderr");
        return kept;
    }

    if let Err(e) = tokio::io::copy(&mut head.into_inner(), &mut tokio::io::sink()).await {
        tracing::debug!(error = %e, "failed to drain tool stderr");
    }
    kept
}

#[cfg(all(test, unix))]
#[path = "../../tests/common/tools.rs"]
pub(crate) mod testing;
