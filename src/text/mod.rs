pub mod embedder;
pub mod recursive;
pub mod semantic;

pub use embedder::{Embedder, GoogleEmbedder};
pub use recursive::RecursiveCharacterSplitter;
pub use semantic::SemanticSplitter;

use crate::config::{Config, EmbeddingProvider, PipelineConfig, TextSplitterKind};
use crate::error::{CineNotesError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// A piece of text with free-form metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }
}

#[async_trait]
pub trait TextSplitter: Send + Sync {
    async fn split_text(&self, text: &str) -> Result<Vec<String>>;

    /// Split each text and wrap every chunk in a [`Document`].
    async fn create_documents(&self, texts: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for text in texts {
            for chunk in self.split_text(text).await? {
                documents.push(Document::new(chunk));
            }
        }
        Ok(documents)
    }

    /// Split documents into smaller ones that keep the original metadata.
    async fn split_documents(&self, documents: &[Document]) -> Result<Vec<Document>> {
        let mut split = Vec::new();
        for document in documents {
            for chunk in self.split_text(&document.page_content).await? {
                split.push(Document {
                    page_content: chunk,
                    metadata: document.metadata.clone(),
                });
            }
        }
        Ok(split)
    }

    fn name(&self) -> &'static str;
}

/// Build the transcript splitter selected in `pipeline`.
pub fn create_splitter(
    config: &Config,
    pipeline: &PipelineConfig,
) -> Result<Box<dyn TextSplitter>> {
    match pipeline.text_splitter {
        TextSplitterKind::Recursive => Ok(Box::new(RecursiveCharacterSplitter::new(
            pipeline.chunk_size,
            pipeline.chunk_overlap,
        )?)),
        TextSplitterKind::Semantic => {
            let embedder: Box<dyn Embedder> = match config.embedding_provider {
                EmbeddingProvider::Google => {
                    let key = config.google_api_key.as_ref().ok_or_else(|| {
                        CineNotesError::Config(
                            "Google API key is required for Google Generative AI Embeddings. \
                             Set the environment variable GOOGLE_API_KEY"
                                .to_string(),
                        )
                    })?;
                    Box::new(GoogleEmbedder::new(key.clone()))
                }
            };
            Ok(Box::new(SemanticSplitter::new(embedder)))
        }
    }
}
