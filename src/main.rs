use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use avatar_gateway::api::ApiServerBuilder;
use avatar_gateway::{Config, Pipeline, Query};

/// Avatar - spoken, lip-synced replies for chat queries
#[derive(Parser)]
#[command(name = "avatar", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/avatar/config.toml when present)
    #[arg(short, long, env = "AVATAR_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides AVATAR_PORT / PORT / config file)
    #[arg(long)]
    port: Option<u16>,

    /// Run the transcode and lip-sync stages
    #[arg(long)]
    media: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and write the results to disk
    Ask {
        /// Query text
        query: String,
        /// Output path without extension; audio and lip-sync files are written next to it
        #[arg(short, long, default_value = "reply")]
        out: PathBuf,
    },
    /// Check that the media tools can be found
    CheckTools,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,avatar_gateway=info",
        1 => "info,avatar_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    if cli.media {
        config.media.enabled = true;
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { query, out } => ask(&config, &query, &out).await,
            Command::CheckTools => check_tools(&config),
        };
    }

    tracing::info!(
        port = config.api_server.port,
        media = config.media.enabled,
        "starting avatar gateway"
    );

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let server = ApiServerBuilder::new(pipeline, config.api_server.port)
        .media_config(&config.media)
        .rate_limit(config.api_server.rate_limit_per_minute)
        .build();

    server.run().await?;
    Ok(())
}

/// Run one query end to end from the terminal
async fn ask(config: &Config, query: &str, out: &Path) -> anyhow::Result<()> {
    let query = Query::new(query).ok_or_else(|| anyhow::anyhow!("query must not be empty"))?;
    let pipeline = Pipeline::from_config(config)?;

    let outcome = pipeline.run(&query).await?;

    println!("Sentiment: {}", outcome.sentiment);
    println!("Reply:     {}", outcome.response_text);

    let audio_ext = if outcome.lip_sync.is_some() { "wav" } else { "mp3" };
    let audio_path = out.with_extension(audio_ext);
    std::fs::write(&audio_path, &outcome.audio)?;
    println!("Audio:     {} ({} bytes)", audio_path.display(), outcome.audio.len());

    if let Some(cues) = &outcome.lip_sync {
        let cues_path = out.with_extension(&config.media.lip_sync_format);
        std::fs::write(&cues_path, cues)?;
        println!("Lip sync:  {}", cues_path.display());
    }

    Ok(())
}

/// Report whether each media tool resolves to an executable
fn check_tools(config: &Config) -> anyhow::Result<()> {
    let mut missing = Vec::new();

    for (label, program) in [
        ("transcoder", &config.media.ffmpeg_path),
        ("lip-sync", &config.media.rhubarb_path),
    ] {
        match which::which(program) {
            Ok(path) => println!("{label:<11} {} -> {}", program.display(), path.display()),
            Err(e) => {
                println!("{label:<11} {} not found ({e})", program.display());
                missing.push(label);
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("missing tools: {}", missing.join(", "));
    }

    Ok(())
}
