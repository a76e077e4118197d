//! Configuration management for the avatar gateway

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use self::file::AvatarConfigFile;
use crate::{Error, Result};

/// Default sentiment analysis / response generation host
pub const DEFAULT_SENTIMENT_URL: &str = "https://sentiment-analysis.eastus.cloudapp.azure.com";

/// Default text-to-speech host
pub const DEFAULT_TTS_URL: &str = "https://tts.ilyaselmabrouki.com";

/// Default API server port
pub const DEFAULT_PORT: u16 = 5000;

/// Avatar gateway configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Upstream HTTP services
    pub services: ServiceConfig,

    /// Audio post-processing tools
    pub media: MediaConfig,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,
}

/// Upstream HTTP service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Sentiment analysis base URL (`POST {url}/analyze`)
    pub sentiment_url: String,

    /// Response generation base URL (`POST {url}/chat/generate-response`)
    pub response_url: String,

    /// Text-to-speech base URL (`POST {url}/generate`)
    pub tts_url: String,

    /// Whole-request timeout for each upstream call
    pub timeout: Duration,

    /// Connect timeout for each upstream call
    pub connect_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sentiment_url: DEFAULT_SENTIMENT_URL.to_string(),
            response_url: DEFAULT_SENTIMENT_URL.to_string(),
            tts_url: DEFAULT_TTS_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Audio post-processing configuration
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Transcode TTS audio to WAV and extract lip-sync data
    pub enabled: bool,

    /// Transcoder binary (name on PATH or absolute path)
    pub ffmpeg_path: PathBuf,

    /// Lip-sync extractor binary (name on PATH or absolute path)
    pub rhubarb_path: PathBuf,

    /// Lip-sync export format passed as `-f`
    pub lip_sync_format: String,

    /// Recognizer passed as `-r`
    pub recognizer: String,

    /// Timeout for each tool invocation
    pub tool_timeout: Duration,

    /// Parent directory for per-request scratch files; system temp dir if unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            rhubarb_path: PathBuf::from("rhubarb"),
            lip_sync_format: "json".to_string(),
            recognizer: "phonetic".to_string(),
            tool_timeout: Duration::from_secs(60),
            scratch_dir: None,
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Global requests-per-minute limit; `None` disables rate limiting
    pub rate_limit_per_minute: Option<u32>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rate_limit_per_minute: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the TOML config file
    ///
    /// Precedence is env > toml > default.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(config_path)?;
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a URL is malformed or a numeric value fails to parse
    pub fn resolve<F>(fc: AvatarConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let services = ServiceConfig {
            sentiment_url: env("AVATAR_SENTIMENT_URL")
                .or(fc.services.sentiment_url)
                .unwrap_or(defaults.services.sentiment_url),
            response_url: env("AVATAR_RESPONSE_URL")
                .or(fc.services.response_url)
                .unwrap_or(defaults.services.response_url),
            tts_url: env("AVATAR_TTS_URL")
                .or(fc.services.tts_url)
                .unwrap_or(defaults.services.tts_url),
            timeout: parse_env::<u64>(&env, "AVATAR_HTTP_TIMEOUT_SECS")?
                .or(fc.services.timeout_secs)
                .map_or(defaults.services.timeout, Duration::from_secs),
            connect_timeout: parse_env::<u64>(&env, "AVATAR_CONNECT_TIMEOUT_SECS")?
                .or(fc.services.connect_timeout_secs)
                .map_or(defaults.services.connect_timeout, Duration::from_secs),
        };

        let media = MediaConfig {
            enabled: parse_env_bool(&env, "AVATAR_MEDIA_ENABLED")
                .or(fc.media.enabled)
                .unwrap_or(defaults.media.enabled),
            ffmpeg_path: env("AVATAR_FFMPEG_PATH")
                .or(fc.media.ffmpeg_path)
                .map_or(defaults.media.ffmpeg_path, PathBuf::from),
            rhubarb_path: env("AVATAR_RHUBARB_PATH")
                .or(fc.media.rhubarb_path)
                .map_or(defaults.media.rhubarb_path, PathBuf::from),
            lip_sync_format: env("AVATAR_LIPSYNC_FORMAT")
                .or(fc.media.lip_sync_format)
                .unwrap_or(defaults.media.lip_sync_format),
            recognizer: env("AVATAR_LIPSYNC_RECOGNIZER")
                .or(fc.media.recognizer)
                .unwrap_or(defaults.media.recognizer),
            tool_timeout: parse_env::<u64>(&env, "AVATAR_TOOL_TIMEOUT_SECS")?
                .or(fc.media.timeout_secs)
                .map_or(defaults.media.tool_timeout, Duration::from_secs),
            scratch_dir: env("AVATAR_SCRATCH_DIR")
                .or(fc.media.scratch_dir)
                .map(PathBuf::from),
        };

        let port = match parse_env::<u16>(&env, "AVATAR_PORT")? {
            Some(port) => Some(port),
            None => parse_env::<u16>(&env, "PORT")?,
        };

        let api_server = ApiServerConfig {
            port: port.or(fc.server.port).unwrap_or(defaults.api_server.port),
            rate_limit_per_minute: parse_env::<u32>(&env, "AVATAR_RATE_LIMIT_PER_MINUTE")?
                .or(fc.server.rate_limit_per_minute),
        };

        let config = Self {
            services,
            media,
            api_server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URLs and timeouts
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("sentiment_url", &self.services.sentiment_url),
            ("response_url", &self.services.response_url),
            ("tts_url", &self.services.tts_url),
        ] {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| Error::Config(format!("invalid {name} '{url}': {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{name} must be http or https, got '{url}'"
                )));
            }
        }

        if self.services.timeout.is_zero() || self.services.connect_timeout.is_zero() {
            return Err(Error::Config("upstream timeouts must be non-zero".to_string()));
        }
        if self.media.tool_timeout.is_zero() {
            return Err(Error::Config("tool timeout must be non-zero".to_string()));
        }
        if self.api_server.rate_limit_per_minute == Some(0) {
            return Err(Error::Config(
                "rate limit must be at least one request per minute".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse an optional numeric env var, rejecting garbage instead of ignoring it
fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

fn parse_env_bool(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    env(key).map(|v| matches!(v.trim(), "true" | "1" | "yes"))
}
