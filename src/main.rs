use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use subgen::acquire::VideoSource;
use subgen::config::{Config, OutputFormat};
use subgen::media::FfmpegExtractor;
use subgen::pipeline::{print_summary, Pipeline, PipelineRequest};
use subgen::storage::LocalStorage;
use subgen::transcribe::SpeechClient;
use subgen::translate::TranslateClient;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "subgen")]
#[command(version, about = "Generate translated subtitles from video")]
#[command(
    long_about = "Extract audio from a video file or link, transcribe it with a \
speech-recognition backend, optionally translate, and write an SRT subtitle file."
)]
struct Cli {
    /// Input video: a local file or an http(s) link
    source: String,

    /// Recognition language tag (e.g. de-DE)
    #[arg(short = 'c', long, default_value = "en-US")]
    language_code: String,

    /// Source language for translation (e.g. de)
    #[arg(short, long, default_value = "en")]
    source_language: String,

    /// Target language for translation (e.g. en); equal to the source skips
    /// translation
    #[arg(short, long, default_value = "en")]
    target_language: String,

    /// Destination path for the subtitle artifact, relative to the storage
    /// root (defaults to subtitles/<target>.<ext>)
    #[arg(short, long)]
    destination: Option<String>,

    /// Storage root directory
    #[arg(long, default_value = ".")]
    storage_root: String,

    /// Output format: srt, vtt
    #[arg(short, long, default_value = "srt")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn default_destination(target_language: &str, format: &OutputFormat) -> String {
    format!("subtitles/{}.{}", target_language, format.extension())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let format: OutputFormat = cli.format.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let translating = cli.source_language != cli.target_language;
    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate(translating)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Configuration validation failed")?;

    let destination = cli
        .destination
        .unwrap_or_else(|| default_destination(&cli.target_language, &format));

    let request = PipelineRequest {
        source: VideoSource::parse(&cli.source),
        language_code: cli.language_code,
        source_language: cli.source_language,
        target_language: cli.target_language,
        destination,
        format,
    };

    info!("Source:   {}", request.source);
    info!("Language: {}", request.language_code);
    if translating {
        info!(
            "Translate: {} -> {}",
            request.source_language, request.target_language
        );
    }
    info!("Output:   {}", request.destination);

    let speech_key = config
        .speech_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("SPEECH_API_KEY not set"))?;
    let transcriber = SpeechClient::new(speech_key)
        .with_base_url(config.speech_endpoint.clone())
        .with_retry(config.retry_policy())
        .with_timeout(std::time::Duration::from_secs(config.transcribe_timeout_secs))
        .with_sync_threshold(std::time::Duration::from_secs(config.sync_threshold_secs))
        .with_poll_interval(std::time::Duration::from_millis(config.poll_interval_ms));

    let translate_key = config.translate_api_key.clone().unwrap_or_default();
    let translator = TranslateClient::new(translate_key)
        .with_base_url(config.translate_endpoint.clone())
        .with_retry(config.retry_policy());

    // Ctrl+C aborts the run at the next stage boundary
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancel_handle = cancelled.clone();
    ctrlc::set_handler(move || {
        cancel_handle.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl+C handler")?;

    let pipeline = Pipeline::new(
        Arc::new(FfmpegExtractor),
        Arc::new(transcriber),
        Arc::new(translator),
        Arc::new(LocalStorage::new(cli.storage_root)),
    )
    .with_cue_config(config.cue_config())
    .with_translation_char_budget(config.translation_char_budget)
    .with_cancel_flag(cancelled)
    .with_progress(true);

    let result = pipeline.run(request).await?;
    print_summary(&result);

    Ok(())
}
