//! Embedding Service Port
//!
//! Abstract interface for text embedding generation.

use async_trait::async_trait;

use crate::domain::errors::DomainError;

/// Service interface for generating text embeddings
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generate embedding vector for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Fixed vector length produced by this service
    fn dimensions(&self) -> usize;

    /// Embed, substituting a zero vector for blank input.
    ///
    /// Blank text is never sent upstream.
    async fn embed_or_zero(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimensions()]);
        }
        self.embed(text).await
    }

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_or_zero(text).await?);
        }
        Ok(embeddings)
    }
}
