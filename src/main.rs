use anyhow::{Context, Result};
use cinenotes::config::{Config, OutputFormat, PipelineConfig, TextSplitterKind};
use cinenotes::transcribe::RunStatus;
use cinenotes::{print_summary, process_media_file, process_video};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "cinenotes")]
#[command(version, about = "Transcribe videos with Whisper")]
#[command(
    long_about = "Download a video (or take a local media file), split its audio into segments, \
                  transcribe them concurrently with a HuggingFace Whisper endpoint and save the \
                  transcript together with text chunks."
)]
struct Cli {
    /// Video URL to download and transcribe
    #[arg(required_unless_present = "input", conflicts_with = "input")]
    url: Option<String>,

    /// Local audio/video file to transcribe instead of a URL
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Length of each audio segment in minutes
    #[arg(short, long, default_value = "10")]
    split_minutes: u32,

    /// Transcript format: text, json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// File name of the saved transcript, without extension
    #[arg(long, default_value = "transcript")]
    output_name: String,

    /// Directory for downloaded videos
    #[arg(short, long, default_value = "./my_videos")]
    output_dir: PathBuf,

    /// Directory holding timestamped run directories
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Whisper model on the HuggingFace Inference API
    #[arg(short, long)]
    model: Option<String>,

    /// Transcript splitter: recursive, semantic
    #[arg(long, default_value = "recursive")]
    splitter: String,

    /// Maximum transcript chunk size in characters
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,

    /// Also extract video frames
    #[arg(long)]
    frames: bool,

    /// Failed-segment share (0, 1] at which the run counts as failed
    #[arg(long)]
    failure_threshold: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn pipeline_config(cli: &Cli) -> Result<PipelineConfig> {
    let output_format: OutputFormat = cli
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let text_splitter: TextSplitterKind = cli
        .splitter
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    Ok(PipelineConfig {
        text_splitter,
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
        output_format,
        output_base_name: cli.output_name.clone(),
        split_minutes: cli.split_minutes,
        failure_threshold: cli.failure_threshold,
        extract_frames: cli.frames,
        show_progress: !cli.no_progress,
        ..PipelineConfig::default()
    })
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref model) = cli.model {
        config.model = model.clone();
    }
    if let Some(ref dir) = cli.artifacts_dir {
        config.artifacts_dir = dir.clone();
    }
    if let Some(timeout) = cli.timeout_secs {
        config.request_timeout_secs = timeout;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let pipeline = pipeline_config(&cli)?;
    pipeline.validate().context("Invalid pipeline options")?;

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli);
    config
        .validate(&pipeline)
        .context("Configuration validation failed")?;

    info!("Model:    {}", config.model);
    info!("Format:   {}", pipeline.output_format);
    info!("Splitter: {}", pipeline.text_splitter);
    info!("Segments: {} minutes", pipeline.split_minutes);

    let result = match (&cli.url, &cli.input) {
        (_, Some(input)) => {
            info!("Input:    {}", input.display());
            process_media_file(input, &config, pipeline)
                .await
                .with_context(|| format!("Failed to transcribe {}", input.display()))?
        }
        (Some(url), None) => {
            info!("URL:      {}", url);
            process_video(url, &cli.output_dir, &config, pipeline)
                .await
                .with_context(|| format!("Failed to transcribe {}", url))?
        }
        (None, None) => anyhow::bail!("Provide a video URL or --input <file>"),
    };

    print_summary(&result);

    if result.transcript.status == RunStatus::Failure {
        anyhow::bail!(
            "{} of {} segments failed",
            result.stats.failed_segments,
            result.stats.total_segments
        );
    }

    Ok(())
}
