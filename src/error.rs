use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CineNotesError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Transcription service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Unexpected response format: {0}")]
    UnexpectedFormat(String),

    #[error("Failed to persist {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Media tool failed: {0}")]
    MediaTool(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, CineNotesError>;
