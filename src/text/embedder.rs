//! Text embeddings for semantic chunking.

use crate::error::{CineNotesError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GOOGLE_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GOOGLE_EMBEDDING_MODEL: &str = "models/embedding-001";

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed every text; the result has one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn name(&self) -> &'static str;
}

/// Google Generative AI embeddings.
pub struct GoogleEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GoogleEmbedder {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: GOOGLE_EMBEDDING_MODEL.to_string(),
            base_url: GOOGLE_API_BASE_URL.to_string(),
        }
    }

    /// Set a different model (e.g. `models/text-embedding-004`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/{}:batchEmbedContents", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedResponse {
    embeddings: Option<Vec<Embedding>>,
}

#[derive(Deserialize, Debug)]
struct Embedding {
    values: Vec<f32>,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

/// Error message for a non-2xx reply. Google wraps it as
/// `{"error": {"message": ...}}`; proxies and gateways may send anything.
fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => format!(
            "Embedding request failed with HTTP {}: {}",
            status,
            body.chars().take(200).collect::<String>()
        ),
    }
}

#[async_trait]
impl Embedder for GoogleEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &self.model,
                    content: EmbedContent {
                        parts: vec![EmbedPart { text }],
                    },
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CineNotesError::Embedding(error_message(status.as_u16(), &text)));
        }

        let body: BatchEmbedResponse = serde_json::from_str(&text).map_err(|e| {
            CineNotesError::Embedding(format!("Failed to parse embedding response: {e}"))
        })?;

        let embeddings = body
            .embeddings
            .ok_or_else(|| CineNotesError::Embedding("Response has no embeddings".to_string()))?;
        if embeddings.len() != texts.len() {
            return Err(CineNotesError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings.into_iter().map(|e| e.values).collect())
    }

    fn name(&self) -> &'static str {
        "Google Generative AI"
    }
}
