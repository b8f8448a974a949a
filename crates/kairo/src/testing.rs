//! Test doubles shared by unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::DomainError;
use crate::ports::{ConversationHandle, EmbeddingService, ReasoningProvider};

/// Maps known texts to fixed vectors; anything else embeds to `fallback`.
pub(crate) struct StubEmbedding {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    fallback: Vec<f32>,
}

impl StubEmbedding {
    pub(crate) fn new(dimensions: usize) -> Self {
        let mut fallback = vec![0.0; dimensions];
        fallback[dimensions - 1] = 1.0;
        Self {
            vectors: Mutex::new(HashMap::new()),
            fallback,
        }
    }

    pub(crate) fn set(&self, text: &str, vector: Vec<f32>) {
        self.vectors.lock().unwrap().insert(text.to_string(), vector);
    }
}

#[async_trait]
impl EmbeddingService for StubEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self
            .vectors
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn dimensions(&self) -> usize {
        self.fallback.len()
    }
}

/// Replays scripted responses and records every prompt it was given.
///
/// Once the script runs out, every call returns `default_response`.
pub(crate) struct ScriptedReasoner {
    script: Mutex<VecDeque<Result<String, DomainError>>>,
    default_response: Result<String, DomainError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: DomainError) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push(&self, response: Result<String, DomainError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedReasoner {
    async fn infer(
        &self,
        prompt: &str,
        _conversation: &ConversationHandle,
    ) -> Result<String, DomainError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.default_response.clone())
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }
}
