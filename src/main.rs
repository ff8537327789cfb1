//! Kataribe - narrated video production pipeline
//!
//! Entry point: parses the command line, sets up logging, loads the
//! configuration and `.env` credentials, then runs one pipeline command.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{Level, info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kataribe::cli::{Args, Commands};
use kataribe::config::{Config, Credentials, Privacy, Provider};
use kataribe::error::KataribeError;
use kataribe::jobs::{JobInfo, JobKind};
use kataribe::upload::VideoMetadata;
use kataribe::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "kataribe.toml";
const DEFAULT_REPORT_PROMPT: &str = "今日の株の注目銘柄に関するレポートを作って。";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Failed to read .env: {}", e),
    }

    if let Commands::ConfigInit { output, force } = &args.command {
        return init_config(output, *force);
    }

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args.command)?;

    let workflow = Workflow::new(config.clone(), Credentials::from_env());

    match args.command {
        Commands::Report { prompt, .. } => {
            let prompt = prompt.unwrap_or_else(|| DEFAULT_REPORT_PROMPT.to_string());
            workflow.report(&prompt).await?;
        }
        Commands::Script { .. } => {
            workflow.script().await?;
        }
        Commands::Blog { inputs, output, .. } => {
            workflow.blog(&inputs, output).await?;
        }
        Commands::Tts => {
            let chunks = workflow.tts().await?;
            info!("Synthesized {} chunk(s)", chunks);
        }
        Commands::Stt => {
            let chunks = workflow.stt().await?;
            info!("Transcribed {} chunk(s)", chunks);
        }
        Commands::Resegment => {
            let chunks = workflow.resegment().await?;
            info!("Re-segmented {} chunk(s)", chunks);
        }
        Commands::Correct { .. } => {
            let chunks = workflow.correct().await?;
            info!("Corrected {} chunk(s)", chunks);
        }
        Commands::Render => {
            let chunks = workflow.render().await?;
            info!("Rendered {} chunk video(s)", chunks);
        }
        Commands::CombineAudio => {
            workflow.combine_audio().await?;
        }
        Commands::CombineVideo => {
            workflow.combine_video().await?;
        }
        Commands::CombineSubtitles => {
            workflow.combine_subtitles().await?;
        }
        Commands::Video => {
            workflow.video().await?;
        }
        Commands::Pipeline { prompt, .. } => {
            let prompt = prompt.unwrap_or_else(|| DEFAULT_REPORT_PROMPT.to_string());
            let video = workflow.pipeline(&prompt).await?;
            println!("{}", video.display());
        }
        Commands::VideoGen { prompt, wait } => {
            print_job(&workflow.create_job(JobKind::Video, &prompt, wait).await?)?;
        }
        Commands::VideoCheck { id } => {
            print_job(&workflow.check_job(JobKind::Video, &id).await?)?;
        }
        Commands::VideoDownload { id, wait, output } => {
            let path = workflow.download_job(JobKind::Video, &id, wait, output).await?;
            println!("{}", path.display());
        }
        Commands::MusicGen { prompt, wait } => {
            print_job(&workflow.create_job(JobKind::Music, &prompt, wait).await?)?;
        }
        Commands::MusicCheck { id } => {
            print_job(&workflow.check_job(JobKind::Music, &id).await?)?;
        }
        Commands::MusicDownload { id, wait, output } => {
            let path = workflow.download_job(JobKind::Music, &id, wait, output).await?;
            println!("{}", path.display());
        }
        Commands::Upload {
            video,
            title,
            description,
            tags,
            privacy,
            category,
        } => {
            let video = video.unwrap_or_else(|| workflow.workspace().final_video_path());
            let mut metadata = VideoMetadata::new(title, description, &config.upload);
            if let Some(tags) = tags {
                metadata.tags = parse_list(&tags);
            }
            if let Some(privacy) = privacy {
                metadata.privacy = privacy.parse::<Privacy>()?;
            }
            if let Some(category) = category {
                metadata.category_id = category;
            }

            let uploaded = workflow.upload(&video, &metadata).await?;
            println!("Video URL: {}", uploaded.url);
        }
        Commands::AiTopics => {
            workflow.ai_topics().await?;
        }
        Commands::CoinTopics => {
            workflow.coin_topics().await?;
        }
        Commands::CoinTopic { topic } => {
            workflow.coin_topic(&topic).await?;
        }
        Commands::Models => {
            println!("{}", serde_json::to_string_pretty(&workflow.models().await?)?);
        }
        Commands::Voices => {
            println!("{}", serde_json::to_string_pretty(&workflow.voices().await?)?);
        }
        Commands::ConfigInit { .. } => {}
    }

    info!("Kataribe finished successfully");
    Ok(())
}

/// Load `--config`, else `kataribe.toml` in the current directory, else defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
            Config::from_file(DEFAULT_CONFIG_FILE)?
        }
        None => Config::default(),
    };
    Ok(config)
}

/// Command-line switches that take precedence over the config file
fn apply_overrides(config: &mut Config, command: &Commands) -> Result<()> {
    match command {
        Commands::Report { provider: Some(p), .. } => {
            config.generation.report_provider = p.parse::<Provider>()?;
        }
        Commands::Script { provider: Some(p) } => {
            config.generation.script_provider = p.parse::<Provider>()?;
        }
        Commands::Blog { provider: Some(p), .. } => {
            config.generation.blog_provider = p.parse::<Provider>()?;
        }
        Commands::Correct { provider: Some(p) } => {
            config.correction.provider = p.parse::<Provider>()?;
        }
        Commands::Pipeline { no_correct: true, .. } => {
            config.correction.enabled = false;
        }
        _ => {}
    }
    Ok(())
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(KataribeError::Config(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        ))
        .into());
    }
    Config::default().save_to_file(output)?;
    info!("Wrote default configuration to {}", output.display());
    Ok(())
}

fn print_job(job: &JobInfo) -> Result<()> {
    println!("{} ({})", job.id, job.status);
    println!("{}", serde_json::to_string_pretty(&job.raw)?);
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".kataribe").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "kataribe.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("kataribe.log").display()
    );

    Ok(())
}
