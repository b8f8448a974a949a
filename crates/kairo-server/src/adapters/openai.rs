//! OpenAI Embedding adapter
//!
//! Uses OpenAI's text-embedding-3-small model. The `dimensions` request
//! field keeps vectors aligned with the Qdrant collection size.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use kairo::{DomainError, EmbeddingService};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Embedding service backed by the OpenAI API
#[derive(Clone)]
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(api_key: String, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            dimensions,
        }
    }
}

/// Timeouts and refused connections are worth retrying
pub(crate) fn map_reqwest_error(service: &str, e: reqwest::Error) -> DomainError {
    if e.is_timeout() || e.is_connect() {
        DomainError::Transient(format!("{}: {}", service, e))
    } else {
        DomainError::ExternalService(format!("{}: {}", service, e))
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let request = EmbeddingRequest {
            input: text,
            model: &self.model,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(EMBEDDINGS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_reqwest_error("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DomainError::from_status(status.as_u16(), error_text));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| DomainError::ExternalService(format!("OpenAI response: {}", e)))?;

        let embedding = embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| DomainError::ExternalService("No embedding returned".into()))?;

        if embedding.len() != self.dimensions {
            return Err(DomainError::ExternalService(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
