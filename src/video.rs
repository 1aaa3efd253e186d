use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::artifacts::RunContext;
use crate::audio::{extract_audio, AudioMetadata};
use crate::error::{CineNotesError, Result};

const VIDEO_FILE: &str = "video.mp4";

/// Paths produced by [`VideoProcessor::download_video`].
#[derive(Debug, Clone)]
pub struct DownloadedVideo {
    pub title: String,
    pub video_dir: PathBuf,
    pub video_path: PathBuf,
    pub audio_dir: PathBuf,
    pub frames_dir: PathBuf,
}

/// Downloads a video with yt-dlp and pulls audio and frames out of it.
pub struct VideoProcessor {
    url: String,
    output_base_dir: PathBuf,
    yt_dlp_path: String,
    run: RunContext,
}

impl VideoProcessor {
    pub fn new(url: impl Into<String>, output_base_dir: &Path, run: RunContext) -> Result<Self> {
        std::fs::create_dir_all(output_base_dir)?;
        let output_base_dir = std::fs::canonicalize(output_base_dir)?;
        info!(
            "Initialized video processor with output directory: {}",
            output_base_dir.display()
        );

        Ok(Self {
            url: url.into(),
            output_base_dir,
            yt_dlp_path: "yt-dlp".to_string(),
            run,
        })
    }

    /// Use a specific yt-dlp executable.
    pub fn with_yt_dlp(mut self, path: impl Into<String>) -> Self {
        self.yt_dlp_path = path.into();
        self
    }

    pub fn output_base_dir(&self) -> &Path {
        &self.output_base_dir
    }

    /// Fetch the video's metadata as JSON.
    pub async fn fetch_metadata(&self) -> Result<Value> {
        debug!("Fetching metadata for {}", self.url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-single-json", "-f", "mp4"])
            .arg(&self.url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                CineNotesError::MediaTool(format!(
                    "yt-dlp is not available ({e}). Install it: https://github.com/yt-dlp/yt-dlp"
                ))
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(CineNotesError::MediaTool(format!(
                "yt-dlp metadata fetch failed: {error}"
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Download the video into `<output_base_dir>/<title>/video.mp4`.
    ///
    /// The raw metadata is saved as `metadata.json` in the run directory.
    pub async fn download_video(&self) -> Result<DownloadedVideo> {
        info!("Starting download for video: {}", self.url);

        let metadata = self.fetch_metadata().await?;
        self.run.save_json("metadata.json", &metadata)?;

        let title = video_title(&metadata);
        info!("Sanitized video title: {}", title);

        let video_dir = self.output_base_dir.join(&title);
        std::fs::create_dir_all(&video_dir)?;

        let template = video_dir.join("video.%(ext)s");
        let output = Command::new(&self.yt_dlp_path)
            .args(["-f", "mp4", "-o"])
            .arg(&template)
            .arg(&self.url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CineNotesError::MediaTool(format!("Failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(CineNotesError::MediaTool(format!(
                "Failed to download video: {error}"
            )));
        }
        info!("Video downloaded successfully");

        let video = DownloadedVideo {
            title,
            video_path: video_dir.join(VIDEO_FILE),
            audio_dir: video_dir.join("audio"),
            frames_dir: video_dir.join("frames"),
            video_dir,
        };
        std::fs::create_dir_all(&video.audio_dir)?;
        std::fs::create_dir_all(&video.frames_dir)?;
        debug!(
            "Prepared {} and {}",
            video.audio_dir.display(),
            video.frames_dir.display()
        );

        Ok(video)
    }

    /// Extract the audio track into `audio/<file_name>`.
    pub async fn extract_audio(
        &self,
        video: &DownloadedVideo,
        file_name: &str,
    ) -> Result<(PathBuf, AudioMetadata)> {
        let audio_path = video.audio_dir.join(file_name);
        let metadata = extract_audio(&video.video_path, &audio_path).await?;
        Ok((audio_path, metadata))
    }

    /// Extract every frame as `frames/<prefix>NNNNN.<ext>`.
    pub async fn extract_frames(
        &self,
        video: &DownloadedVideo,
        prefix: &str,
        ext: &str,
    ) -> Result<PathBuf> {
        if !video.video_path.exists() {
            return Err(CineNotesError::FileNotFound(
                video.video_path.display().to_string(),
            ));
        }

        info!("Extracting frames to: {}", video.frames_dir.display());
        let pattern = video.frames_dir.join(format!("{prefix}%05d.{ext}"));

        let output = Command::new("ffmpeg")
            .arg("-i")
            .arg(&video.video_path)
            .arg(&pattern)
            .arg("-y")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CineNotesError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(CineNotesError::MediaTool(format!(
                "Frame extraction failed: {error}"
            )));
        }

        info!("Frame extraction completed");
        Ok(video.frames_dir.clone())
    }
}

fn video_title(metadata: &Value) -> String {
    let title = sanitize_filename(metadata["title"].as_str().unwrap_or("video"));
    if title.is_empty() {
        "video".to_string()
    } else {
        title
    }
}

/// Drop characters that are unsafe in a directory name.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Rust: The Movie / Part 2?"), "Rust The Movie  Part 2");
        assert_eq!(sanitize_filename("  clip_01-final.v2  "), "clip_01-final.v2");
        assert_eq!(sanitize_filename("日本語 タイトル"), "日本語 タイトル");
    }

    #[test]
    fn test_video_title_defaults() {
        assert_eq!(video_title(&json!({"title": "A/B"})), "AB");
        assert_eq!(video_title(&json!({})), "video");
        assert_eq!(video_title(&json!({"title": "???"})), "video");
    }

    #[tokio::test]
    async fn test_missing_yt_dlp_is_media_tool_error() {
        let base = TempDir::new().unwrap();
        let run = RunContext::new(base.path().join("artifacts"));
        let processor =
            VideoProcessor::new("https://example.com/v", &base.path().join("videos"), run)
                .unwrap()
                .with_yt_dlp("/nonexistent/yt-dlp");

        assert!(processor.output_base_dir().is_dir());
        let result = processor.download_video().await;
        assert!(matches!(result, Err(CineNotesError::MediaTool(_))));
    }

    #[tokio::test]
    async fn test_extract_frames_requires_video() {
        let base = TempDir::new().unwrap();
        let run = RunContext::new(base.path().join("artifacts"));
        let processor = VideoProcessor::new("https://example.com/v", base.path(), run).unwrap();
        let video = DownloadedVideo {
            title: "missing".to_string(),
            video_dir: base.path().join("missing"),
            video_path: base.path().join("missing").join(VIDEO_FILE),
            audio_dir: base.path().join("missing").join("audio"),
            frames_dir: base.path().join("missing").join("frames"),
        };

        let result = processor.extract_frames(&video, "frame_", "jpg").await;
        assert!(matches!(result, Err(CineNotesError::FileNotFound(_))));
    }
}
