//! TOML configuration file loading
//!
//! Supports `~/.config/avatar/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvatarConfigFile {
    /// Upstream service endpoints
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Audio post-processing (transcode + lip-sync)
    #[serde(default)]
    pub media: MediaFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Upstream service configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesFileConfig {
    /// Sentiment analysis base URL
    pub sentiment_url: Option<String>,

    /// Response generation base URL
    pub response_url: Option<String>,

    /// Text-to-speech base URL
    pub tts_url: Option<String>,

    /// Whole-request timeout for upstream calls, in seconds
    pub timeout_secs: Option<u64>,

    /// Connect timeout for upstream calls, in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Media tool configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaFileConfig {
    /// Run the transcode and lip-sync stages
    pub enabled: Option<bool>,

    /// Path or name of the transcoder binary
    pub ffmpeg_path: Option<String>,

    /// Path or name of the lip-sync extractor binary
    pub rhubarb_path: Option<String>,

    /// Lip-sync export format (e.g. "json", "tsv", "xml")
    pub lip_sync_format: Option<String>,

    /// Lip-sync recognizer ("phonetic" or "pocketSphinx")
    pub recognizer: Option<String>,

    /// Per-tool timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Parent directory for scratch files
    pub scratch_dir: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Requests per minute across all clients
    pub rate_limit_per_minute: Option<u32>,
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. The standard path is optional:
/// returns `AvatarConfigFile::default()` if it doesn't exist or can't be parsed.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be read or parsed
pub fn load_config_file(explicit: Option<&Path>) -> Result<AvatarConfigFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = parse_config(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(AvatarConfigFile::default());
    };

    if !path.exists() {
        return Ok(AvatarConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(AvatarConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(AvatarConfigFile::default())
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed or has unknown keys
pub fn parse_config(content: &str) -> Result<AvatarConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/avatar/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("avatar").join("config.toml"))
}
