use crate::error::{CineNotesError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default Whisper model served by the HuggingFace Inference API.
pub const DEFAULT_MODEL: &str = "openai/whisper-large-v3-turbo";

/// Default per-request timeout for transcription calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Binary,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Binary => write!(f, "binary"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "binary" | "bin" => Ok(OutputFormat::Binary),
            _ => Err(format!(
                "Unknown format: {}. Use 'text', 'json', or 'binary'",
                s
            )),
        }
    }
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Binary => "bin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSplitterKind {
    Semantic,
    #[default]
    Recursive,
}

impl std::fmt::Display for TextSplitterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextSplitterKind::Semantic => write!(f, "semantic"),
            TextSplitterKind::Recursive => write!(f, "recursive"),
        }
    }
}

impl std::str::FromStr for TextSplitterKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semantic" => Ok(TextSplitterKind::Semantic),
            "recursive" => Ok(TextSplitterKind::Recursive),
            _ => Err(format!(
                "Invalid text splitter: {}. Use 'semantic' or 'recursive'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Google,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Google => write!(f, "google"),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(EmbeddingProvider::Google),
            _ => Err(format!("Invalid provider: {}. Options are ['google']", s)),
        }
    }
}

/// Persistent settings: credentials, endpoints and output roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub huggingface_token: Option<String>,
    pub google_api_key: Option<String>,
    pub model: String,
    pub embedding_provider: EmbeddingProvider,
    pub artifacts_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            huggingface_token: None,
            google_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            embedding_provider: EmbeddingProvider::default(),
            artifacts_dir: PathBuf::from("artifacts"),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(token) = std::env::var("HUGGINGFACE_WHISPER_TOKEN") {
            config.huggingface_token = Some(token);
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            config.google_api_key = Some(key);
        }
        if let Ok(model) = std::env::var("CINENOTES_MODEL") {
            config.model = model;
        }
        if let Ok(dir) = std::env::var("CINENOTES_ARTIFACTS_DIR") {
            config.artifacts_dir = PathBuf::from(dir);
        }
        if let Ok(timeout) = std::env::var("CINENOTES_REQUEST_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                config.request_timeout_secs = t;
            }
        }

        Ok(config)
    }

    /// Check credentials for the run described by `pipeline`.
    pub fn validate(&self, pipeline: &PipelineConfig) -> Result<()> {
        if self.huggingface_token.as_deref().map_or(true, str::is_empty) {
            return Err(CineNotesError::Config(
                "HUGGINGFACE_WHISPER_TOKEN not found in environment variables".to_string(),
            ));
        }

        if pipeline.text_splitter == TextSplitterKind::Semantic && self.google_api_key.is_none() {
            return Err(CineNotesError::Config(
                "Google API key is required for semantic chunking. Set GOOGLE_API_KEY".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(CineNotesError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cinenotes").join("config.toml"))
    }
}

/// Per-run settings for the transcription pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Splitter used to chunk the final transcript.
    pub text_splitter: TextSplitterKind,
    /// Maximum transcript chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive transcript chunks.
    pub chunk_overlap: usize,
    /// Format of the saved transcript.
    pub output_format: OutputFormat,
    /// File name (without extension) of the saved transcript.
    pub output_base_name: String,
    /// Length of each audio segment in minutes.
    pub split_minutes: u32,
    /// Failed-segment share at which the run counts as failed.
    pub failure_threshold: Option<f64>,
    /// Parent directory for segment scratch storage (system temp if unset).
    pub scratch_root: Option<PathBuf>,
    /// Also extract video frames when processing a downloaded video.
    pub extract_frames: bool,
    /// Show progress bars.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text_splitter: TextSplitterKind::default(),
            chunk_size: 1000,
            chunk_overlap: 200,
            output_format: OutputFormat::default(),
            output_base_name: "transcript".to_string(),
            split_minutes: 10,
            failure_threshold: None,
            scratch_root: None,
            extract_frames: false,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.split_minutes == 0 {
            return Err(CineNotesError::Config(
                "split_minutes must be greater than 0".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(CineNotesError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(CineNotesError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        let name = self.output_base_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(CineNotesError::Config(format!(
                "Invalid output base name: '{}'",
                self.output_base_name
            )));
        }
        if self.output_format == OutputFormat::Binary {
            return Err(CineNotesError::Config(
                "Transcripts are text; use 'text' or 'json' output format".to_string(),
            ));
        }
        if let Some(threshold) = self.failure_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(CineNotesError::Config(format!(
                    "failure_threshold must be in (0, 1], got {}",
                    threshold
                )));
            }
        }
        Ok(())
    }

    pub fn split_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.split_minutes) * 60)
    }
}
