use crate::artifacts::RunContext;
use crate::audio::{check_ffmpeg, extract_audio, split_in, MediaBuffer};
use crate::config::{Config, PipelineConfig};
use crate::error::{CineNotesError, Result};
use crate::text::{create_splitter, Document, TextSplitter};
use crate::transcribe::{
    aggregate_with_policy, create_transcriber, AggregatedResult, AggregationPolicy, DispatchStats,
    Dispatcher, RunStatus, Transcriber,
};
use crate::video::VideoProcessor;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info};

/// Statistics from one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total time taken for the entire pipeline.
    pub total_time: Duration,
    /// Time spent downloading the video (zero for local files).
    pub download_time: Duration,
    /// Time taken for audio extraction.
    pub extraction_time: Duration,
    /// Time taken for segmentation, dispatch and aggregation.
    pub transcription_time: Duration,
    /// Total audio duration.
    pub audio_duration: Duration,
    pub total_segments: usize,
    pub successful_segments: usize,
    pub failed_segments: usize,
    pub word_count: usize,
    /// Number of transcript chunks produced by the text splitter.
    pub text_chunks: usize,
}

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct PipelineResult {
    /// Path to the saved transcript.
    pub output_path: PathBuf,
    /// Path to the saved transcript chunks, if the transcript was non-empty.
    pub chunks_path: Option<PathBuf>,
    /// Run directory holding every artifact of this run.
    pub run_dir: PathBuf,
    /// Directory holding extracted frames, when requested.
    pub frames_dir: Option<PathBuf>,
    pub transcript: AggregatedResult,
    pub stats: PipelineStats,
}

/// Split → dispatch → aggregate over one media buffer, plus persistence of
/// the outcome into a [`RunContext`].
pub struct TranscriptionPipeline {
    transcriber: Arc<dyn Transcriber>,
    config: PipelineConfig,
    run: RunContext,
}

impl TranscriptionPipeline {
    pub fn new(
        transcriber: Box<dyn Transcriber>,
        config: PipelineConfig,
        run: RunContext,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transcriber: Arc::from(transcriber),
            config,
            run,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> &RunContext {
        &self.run
    }

    /// Transcribe a decoded buffer.
    ///
    /// Segment files live in a scratch directory that is removed before this
    /// returns, whatever the outcome.
    pub async fn transcribe_buffer(
        &self,
        buffer: &MediaBuffer,
    ) -> Result<(AggregatedResult, DispatchStats)> {
        let segments = split_in(
            buffer,
            self.config.split_duration(),
            self.config.scratch_root.as_deref(),
        )?;
        info!("Created {} audio segments", segments.len());

        let dispatcher = Dispatcher::from_shared(self.transcriber.clone())
            .with_progress(self.config.show_progress);
        let (responses, stats) = dispatcher.dispatch_with_stats(&segments.segments).await;

        let policy = AggregationPolicy {
            failure_threshold: self.config.failure_threshold,
        };
        let result = aggregate_with_policy(&responses, &policy);
        info!(
            "Aggregated {} segments: {} ({} words, {} errors)",
            responses.len(),
            result.status,
            result.word_count,
            result.error_logs.len()
        );

        segments.scratch.cleanup();
        Ok((result, stats))
    }

    /// Decode a WAV file and transcribe it.
    pub async fn transcribe_file(&self, path: &Path) -> Result<(AggregatedResult, DispatchStats)> {
        let buffer = MediaBuffer::from_wav(path)?;
        debug!(
            "Decoded {}: {:.1}s at {} Hz",
            path.display(),
            buffer.duration().as_secs_f64(),
            buffer.sample_rate()
        );
        self.transcribe_buffer(&buffer).await
    }

    /// Save the transcript as `<output_base_name>.<ext>` in the run directory.
    pub fn save_result(&self, result: &AggregatedResult) -> Result<PathBuf> {
        let content = result.to_artifact(self.config.output_format)?;
        self.run
            .save(&self.config.output_base_name, &content, self.config.output_format)
    }

    /// Split the combined transcript and save the chunks as
    /// `<output_base_name>_chunks.json`. Returns `None` for an empty transcript.
    pub async fn chunk_transcript(
        &self,
        splitter: &dyn TextSplitter,
        result: &AggregatedResult,
    ) -> Result<Option<(Vec<Document>, PathBuf)>> {
        let text = result.combined_text.trim();
        if text.is_empty() {
            info!("Transcript is empty, skipping text chunking");
            return Ok(None);
        }

        info!("Chunking transcript with {} splitter", splitter.name());
        let documents = splitter.create_documents(&[text.to_string()]).await?;
        let filename = format!("{}_chunks.json", self.config.output_base_name);
        let path = self.run.save_json(&filename, &documents)?;
        info!("Split transcript into {} chunks", documents.len());

        Ok(Some((documents, path)))
    }
}

fn spinner(show: bool, message: &'static str) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Download a video, extract its audio and transcribe it.
///
/// 1. Downloads the video with yt-dlp into `<output_dir>/<title>/`
/// 2. Extracts audio (and frames if requested)
/// 3. Splits, dispatches and aggregates the audio
/// 4. Saves the transcript and its text chunks into the run directory
pub async fn process_video(
    url: &str,
    output_dir: &Path,
    config: &Config,
    pipeline_config: PipelineConfig,
) -> Result<PipelineResult> {
    let start_time = Instant::now();

    pipeline_config.validate()?;
    config.validate(&pipeline_config)?;
    check_ffmpeg().await?;

    let run = RunContext::new(&config.artifacts_dir);
    let splitter = create_splitter(config, &pipeline_config)?;
    let pipeline = TranscriptionPipeline::new(create_transcriber(config)?, pipeline_config, run)?;
    let show_progress = pipeline.config.show_progress;

    info!("Stage 1/4: Downloading {}", url);
    let download_start = Instant::now();
    let pb = spinner(show_progress, "Downloading video...");
    let processor = VideoProcessor::new(url, output_dir, pipeline.run.clone())?;
    let video = processor.download_video().await?;
    if let Some(pb) = pb {
        pb.finish_with_message(format!("✓ Downloaded '{}'", video.title));
    }
    let download_time = download_start.elapsed();

    info!("Stage 2/4: Extracting audio from {}", video.video_path.display());
    let extraction_start = Instant::now();
    let pb = spinner(show_progress, "Extracting audio...");
    let (audio_path, metadata) = processor.extract_audio(&video, "audio.wav").await?;
    let frames_dir = if pipeline.config.extract_frames {
        Some(processor.extract_frames(&video, "frame_", "jpg").await?)
    } else {
        None
    };
    if let Some(pb) = pb {
        pb.finish_with_message(format!(
            "✓ Audio extracted ({:.1}s)",
            metadata.duration.as_secs_f64()
        ));
    }
    let extraction_time = extraction_start.elapsed();

    let mut result = transcribe_and_save(&pipeline, splitter.as_ref(), &audio_path).await?;
    result.frames_dir = frames_dir;
    result.stats.download_time = download_time;
    result.stats.extraction_time = extraction_time;
    result.stats.audio_duration = metadata.duration;
    result.stats.total_time = start_time.elapsed();
    Ok(result)
}

/// Transcribe a local audio or video file.
pub async fn process_media_file(
    input: &Path,
    config: &Config,
    pipeline_config: PipelineConfig,
) -> Result<PipelineResult> {
    let start_time = Instant::now();

    pipeline_config.validate()?;
    config.validate(&pipeline_config)?;
    if !input.exists() {
        return Err(CineNotesError::FileNotFound(input.display().to_string()));
    }
    check_ffmpeg().await?;

    let run = RunContext::new(&config.artifacts_dir);
    let splitter = create_splitter(config, &pipeline_config)?;
    let pipeline = TranscriptionPipeline::new(create_transcriber(config)?, pipeline_config, run)?;

    info!("Stage 1/4: Extracting audio from {}", input.display());
    let extraction_start = Instant::now();
    let pb = spinner(pipeline.config.show_progress, "Extracting audio...");
    let work_dir = TempDir::new()?;
    let audio_path = work_dir.path().join("audio.wav");
    let metadata = extract_audio(input, &audio_path).await?;
    if let Some(pb) = pb {
        pb.finish_with_message(format!(
            "✓ Audio extracted ({:.1}s)",
            metadata.duration.as_secs_f64()
        ));
    }
    let extraction_time = extraction_start.elapsed();

    let mut result = transcribe_and_save(&pipeline, splitter.as_ref(), &audio_path).await?;
    result.stats.extraction_time = extraction_time;
    result.stats.audio_duration = metadata.duration;
    result.stats.total_time = start_time.elapsed();
    Ok(result)
}

async fn transcribe_and_save(
    pipeline: &TranscriptionPipeline,
    splitter: &dyn TextSplitter,
    audio_path: &Path,
) -> Result<PipelineResult> {
    info!(
        "Stage 3/4: Transcribing in {}-minute segments",
        pipeline.config.split_minutes
    );
    let transcription_start = Instant::now();
    let (transcript, dispatch_stats) = pipeline.transcribe_file(audio_path).await?;
    let transcription_time = transcription_start.elapsed();

    info!(
        "Stage 4/4: Saving {} transcript",
        pipeline.config.output_format
    );
    let output_path = pipeline.save_result(&transcript)?;
    let chunks = pipeline.chunk_transcript(splitter, &transcript).await?;
    let (text_chunks, chunks_path) = match chunks {
        Some((documents, path)) => (documents.len(), Some(path)),
        None => (0, None),
    };

    let stats = PipelineStats {
        transcription_time,
        total_segments: dispatch_stats.total_segments,
        successful_segments: dispatch_stats.successful_segments,
        failed_segments: dispatch_stats.failed_segments,
        word_count: transcript.word_count,
        text_chunks,
        ..PipelineStats::default()
    };

    Ok(PipelineResult {
        output_path,
        chunks_path,
        run_dir: pipeline.run.run_dir()?,
        frames_dir: None,
        transcript,
        stats,
    })
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    let status = match result.transcript.status {
        RunStatus::Success => style(result.transcript.status.to_string()).green(),
        RunStatus::PartialSuccess => style(result.transcript.status.to_string()).yellow(),
        RunStatus::Failure => style(result.transcript.status.to_string()).red(),
    };

    println!();
    println!("{}", style("═══ Transcription Complete ═══").bold());
    println!();
    println!("  Status:     {}", status);
    println!("  Transcript: {}", result.output_path.display());
    if let Some(ref path) = result.chunks_path {
        println!(
            "  Chunks:     {} ({} chunks)",
            path.display(),
            result.stats.text_chunks
        );
    }
    if let Some(ref dir) = result.frames_dir {
        println!("  Frames:     {}", dir.display());
    }
    println!("  Run dir:    {}", result.run_dir.display());
    println!("  Words:      {}", result.stats.word_count);
    println!(
        "  Segments:   {}/{} successful",
        result.stats.successful_segments, result.stats.total_segments
    );
    println!(
        "  Duration:   {:.1}s audio",
        result.stats.audio_duration.as_secs_f64()
    );
    println!();
    println!("  Timing:");
    if !result.stats.download_time.is_zero() {
        println!(
            "    Download:    {:.2}s",
            result.stats.download_time.as_secs_f64()
        );
    }
    println!(
        "    Extract:     {:.2}s",
        result.stats.extraction_time.as_secs_f64()
    );
    println!(
        "    Transcribe:  {:.2}s",
        result.stats.transcription_time.as_secs_f64()
    );
    println!(
        "    Total:       {:.2}s",
        result.stats.total_time.as_secs_f64()
    );

    if !result.transcript.error_logs.is_empty() {
        println!();
        println!("  {}", style("Errors:").yellow().bold());
        for error in &result.transcript.error_logs {
            println!("    {} {}", style("!").yellow(), error);
        }
    }
    println!();
}
