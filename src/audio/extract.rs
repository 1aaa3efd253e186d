use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{CineNotesError, Result};

use super::AudioMetadata;

/// Sample rate of extracted audio; what Whisper expects.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

async fn check_tool(tool: &str, hint: &str) -> Result<()> {
    let output = Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| CineNotesError::MediaTool(format!("{tool} not found. {hint} Error: {e}")))?;

    if !output.status.success() {
        return Err(CineNotesError::MediaTool(format!("{tool} check failed")));
    }

    debug!("{} is available", tool);
    Ok(())
}

/// Check if FFmpeg is installed and accessible.
pub async fn check_ffmpeg() -> Result<()> {
    check_tool(
        "ffmpeg",
        "Please install FFmpeg and ensure it's in your PATH.",
    )
    .await
}

/// Check if FFprobe is installed and accessible.
pub async fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe", "Please install FFmpeg (includes FFprobe).").await
}

/// Get media duration using FFprobe.
pub async fn get_audio_duration(input: &Path) -> Result<Duration> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .await
        .map_err(|e| CineNotesError::MediaTool(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CineNotesError::MediaTool(format!("FFprobe failed: {stderr}")));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let secs: f64 = raw.trim().parse().map_err(|e| {
        CineNotesError::MediaTool(format!("Failed to parse duration '{}': {e}", raw.trim()))
    })?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(CineNotesError::MediaTool(format!(
            "Invalid duration '{}'",
            raw.trim()
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Extract the audio track of a video/audio file into a WAV file.
///
/// The output is mono 16-bit PCM at 16kHz.
pub async fn extract_audio(input: &Path, output: &Path) -> Result<AudioMetadata> {
    check_ffmpeg().await?;
    check_ffprobe().await?;

    if !input.exists() {
        return Err(CineNotesError::FileNotFound(input.display().to_string()));
    }

    info!("Extracting audio from {}", input.display());

    let duration = get_audio_duration(input).await?;
    debug!("Input duration: {:?}", duration);

    let output_cmd = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
        .arg(TARGET_SAMPLE_RATE.to_string())
        .args(["-ac", "1"])
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CineNotesError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

    if !output_cmd.status.success() {
        let stderr = String::from_utf8_lossy(&output_cmd.stderr);
        return Err(CineNotesError::MediaTool(format!(
            "FFmpeg audio extraction failed: {stderr}"
        )));
    }

    if !output.exists() {
        return Err(CineNotesError::MediaTool(
            "Output file was not created".to_string(),
        ));
    }

    info!("Audio extracted to {}", output.display());

    Ok(AudioMetadata {
        duration,
        sample_rate: TARGET_SAMPLE_RATE,
        channels: 1,
    })
}
