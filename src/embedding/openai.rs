//! OpenAI embeddings implementation.

use super::Embedder;
use crate::error::{BlikkError, Result};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, instrument, warn};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder with default settings.
    pub fn new() -> Self {
        Self::with_config("text-embedding-3-small", 1536)
    }

    /// Create a new OpenAI embedder with custom model and dimensions.
    pub fn with_config(model: &str, dimensions: usize) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            dimensions,
        }
    }

    async fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(chunk.to_vec()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| BlikkError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| BlikkError::OpenAI(format!("Embedding API error: {}", e)))?;

        if response.data.len() != chunk.len() {
            return Err(BlikkError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunk.len(),
                response.data.len()
            )));
        }

        // Sort by index to ensure correct order
        let mut embeddings: Vec<_> = response.data.into_iter().collect();
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }
}

impl Default for OpenAIEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| BlikkError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(BlikkError::Embedding(
                "No texts to embed".to_string(),
            ));
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // OpenAI has a limit on batch size; chunks run concurrently and
        // are reassembled in input order.
        const BATCH_SIZE: usize = 100;
        let chunk_results =
            try_join_all(texts.chunks(BATCH_SIZE).map(|chunk| self.embed_chunk(chunk))).await?;

        let all_embeddings: Vec<Vec<f32>> = chunk_results.into_iter().flatten().collect();

        for embedding in &all_embeddings {
            if embedding.len() != self.dimensions {
                // The embedding service may be reconfigured independently of
                // this code; a mismatch degrades search, it does not stop it.
                warn!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimensions,
                    embedding.len()
                );
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::new();
        assert_eq!(embedder.dimensions(), 1536);

        let embedder = OpenAIEmbedder::with_config("text-embedding-3-large", 3072);
        assert_eq!(embedder.dimensions(), 3072);
    }
}
