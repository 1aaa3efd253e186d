use crate::audio::Segment;
use crate::config::{DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::{CineNotesError, Result};
use crate::transcribe::{SegmentResponse, Transcriber};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// HuggingFace Inference API base URL.
const HF_API_BASE_URL: &str = "https://api-inference.huggingface.co";

/// HuggingFace Inference API client for Whisper models.
///
/// One instance (and its connection pool) is shared by every request of a
/// dispatch; nothing in it is mutated after construction.
pub struct HuggingFaceClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

impl HuggingFaceClient {
    /// Create a new client with the given bearer token.
    pub fn new(api_key: String) -> Result<Self> {
        let timeout = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url: HF_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout,
        })
    }

    /// Set the model to use (e.g. `openai/whisper-large-v3`).
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Point the client at another server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    /// Classify a reply from the inference endpoint.
    fn parse_response(status: u16, body: &str) -> Result<SegmentResponse> {
        if !(200..300).contains(&status) {
            // The service reports failures as {"error": "..."}
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            return Err(CineNotesError::HttpStatus {
                status,
                body: message,
            });
        }

        let text = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("text").and_then(Value::as_str).map(str::to_string));

        Ok(match text {
            Some(text) => SegmentResponse::Success {
                status_code: status,
                text,
            },
            None => SegmentResponse::Unrecognized {
                status_code: status,
                body: body.to_string(),
            },
        })
    }
}

#[async_trait]
impl Transcriber for HuggingFaceClient {
    async fn transcribe(&self, segment: &Segment) -> Result<SegmentResponse> {
        debug!(
            "Transcribing segment {} with HuggingFace: {:?}",
            segment.index, segment.path
        );

        let audio = fs::read(&segment.path).await?;

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("Content-Type", "audio/wav")
            .body(audio)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(
            "HuggingFace response for segment {} ({}): {}",
            segment.index,
            status,
            body.chars().take(200).collect::<String>()
        );

        Self::parse_response(status, &body)
    }

    fn name(&self) -> &'static str {
        "HuggingFace Whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = HuggingFaceClient::new("hf_test".to_string()).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api-inference.huggingface.co/models/openai/whisper-large-v3-turbo"
        );

        let client = client
            .with_base_url("http://localhost:8080/")
            .with_model("openai/whisper-tiny".to_string());
        assert_eq!(
            client.endpoint(),
            "http://localhost:8080/models/openai/whisper-tiny"
        );
    }

    #[test]
    fn test_timeout_defaults_and_overrides() {
        let client = HuggingFaceClient::new("hf_test".to_string()).unwrap();
        assert_eq!(
            client.timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );

        let client = client.with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_success() {
        let response = HuggingFaceClient::parse_response(200, r#"{"text": " hello"}"#).unwrap();
        assert_eq!(
            response,
            SegmentResponse::Success {
                status_code: 200,
                text: " hello".to_string()
            }
        );
    }

    #[test]
    fn test_parse_missing_text_is_unrecognized() {
        let response =
            HuggingFaceClient::parse_response(200, r#"{"chunks": []}"#).unwrap();
        assert!(matches!(
            response,
            SegmentResponse::Unrecognized { status_code: 200, .. }
        ));

        let response = HuggingFaceClient::parse_response(200, "not json").unwrap();
        assert!(matches!(response, SegmentResponse::Unrecognized { .. }));
    }

    #[test]
    fn test_parse_http_error_extracts_message() {
        let err = HuggingFaceClient::parse_response(
            503,
            r#"{"error": "Model is currently loading"}"#,
        )
        .unwrap_err();
        match err {
            CineNotesError::HttpStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Model is currently loading");
            }
            other => panic!("Expected HttpStatus, got {other}"),
        }
    }
}
