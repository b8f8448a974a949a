//! Gemini reasoning adapter
//!
//! Calls `generateContent` with the conversation's prior turns so a handle
//! behaves like a continuing chat. History is capped per handle.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use kairo::{ConversationHandle, DomainError, ReasoningProvider};

use super::openai::map_reqwest_error;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Turns (user + model messages) kept per conversation
const MAX_HISTORY_TURNS: usize = 20;

/// Reasoning provider backed by Gemini
pub struct GeminiReasoner {
    client: Client,
    api_key: String,
    model: String,
    history: DashMap<String, VecDeque<Content>>,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: &str) -> Self {
        Self {
            role: "user",
            parts: vec![Part { text: text.to_string() }],
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model",
            parts: vec![Part { text: text.to_string() }],
        }
    }
}

impl GeminiReasoner {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            history: DashMap::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn remember(&self, conversation: &ConversationHandle, prompt: &str, answer: &str) {
        let mut turns = self
            .history
            .entry(conversation.as_str().to_string())
            .or_default();
        turns.push_back(Content::user(prompt));
        turns.push_back(Content::model(answer));
        while turns.len() > MAX_HISTORY_TURNS {
            turns.pop_front();
        }
    }
}

fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ReasoningProvider for GeminiReasoner {
    async fn infer(
        &self,
        prompt: &str,
        conversation: &ConversationHandle,
    ) -> Result<String, DomainError> {
        let mut contents: Vec<Content> = self
            .history
            .get(conversation.as_str())
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default();
        contents.push(Content::user(prompt));

        let url = format!("{}/{}:generateContent?key={}", BASE_URL, self.model, self.api_key);

        let response = self
            .client
            .post(&url)
            .json(&GenerateContentRequest {
                contents: &contents,
            })
            .send()
            .await
            .map_err(|e| map_reqwest_error("Gemini", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(DomainError::from_status(status.as_u16(), body));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| DomainError::ExternalService(format!("Gemini response: {}", e)))?;

        let answer = extract_text(payload)
            .ok_or_else(|| DomainError::ExternalService("Gemini returned no text".into()))?;

        self.remember(conversation, prompt, &answer);
        Ok(answer)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn forget(&self, conversation: &ConversationHandle) {
        self.history.remove(conversation.as_str());
    }
}
