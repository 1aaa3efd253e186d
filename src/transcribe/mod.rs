pub mod aggregate;
pub mod dispatcher;
pub mod huggingface;

pub use aggregate::{
    aggregate, aggregate_with_policy, AggregatedResult, AggregationPolicy, RunStatus,
};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use huggingface::HuggingFaceClient;

use crate::audio::Segment;
use crate::config::Config;
use crate::error::{CineNotesError, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Outcome of sending one segment to the transcription service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SegmentResponse {
    Success { status_code: u16, text: String },
    Failure { error: String },
    /// A 2xx reply whose body carries no transcript.
    Unrecognized { status_code: u16, body: String },
}

impl SegmentResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, SegmentResponse::Success { .. })
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Send one segment. Transport and HTTP-status problems are returned as
    /// errors; the dispatcher turns them into [`SegmentResponse::Failure`].
    async fn transcribe(&self, segment: &Segment) -> Result<SegmentResponse>;
    fn name(&self) -> &'static str;
}

/// Build the transcription client described by `config`.
pub fn create_transcriber(config: &Config) -> Result<Box<dyn Transcriber>> {
    let token = config
        .huggingface_token
        .as_ref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            CineNotesError::Config(
                "HUGGINGFACE_WHISPER_TOKEN not found in environment variables".to_string(),
            )
        })?;

    let client = HuggingFaceClient::new(token.clone())?
        .with_model(config.model.clone())
        .with_timeout(config.request_timeout())?;

    Ok(Box::new(client))
}
