pub mod artifacts;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod text;
pub mod transcribe;
pub mod video;

pub use artifacts::{ArtifactContent, RunContext};
pub use config::{Config, PipelineConfig};
pub use error::{CineNotesError, Result};
pub use pipeline::{
    print_summary, process_media_file, process_video, PipelineResult, PipelineStats,
    TranscriptionPipeline,
};
