//! Kairo API Client

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// API Client for Kairo
pub struct KairoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

// ============================================
// API Response Types
// ============================================

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub is_running: bool,
    pub is_paused: bool,
    pub iteration_count: u64,
    pub current_directive: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectiveResponse {
    pub id: String,
    pub queued: usize,
}

#[derive(Debug, Deserialize)]
pub struct MemoryHit {
    pub id: String,
    pub kind: String,
    pub summary: String,
    pub importance: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<MemoryHit>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsResponse {
    pub recent_count: usize,
    pub durable_count: u64,
    pub semantic_count: u64,
    pub semantic_enabled: bool,
}

#[derive(Debug, Serialize)]
struct DirectiveRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SearchMemoriesRequest<'a> {
    query: &'a str,
    limit: usize,
    min_score: f32,
}

impl KairoClient {
    /// Create a new API client
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach auth, send, and decode a JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        };

        let resp = request
            .send()
            .await
            .context("Failed to connect to Kairo API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("API error ({}): {}", status, body);
        }

        resp.json().await.context("Failed to parse response")
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.send(self.client.get(self.url("/agent/status"))).await
    }

    pub async fn pause(&self) -> Result<StatusResponse> {
        self.send(self.client.post(self.url("/agent/pause"))).await
    }

    pub async fn resume(&self) -> Result<StatusResponse> {
        self.send(self.client.post(self.url("/agent/resume"))).await
    }

    pub async fn submit_directive(&self, text: &str) -> Result<DirectiveResponse> {
        self.send(
            self.client
                .post(self.url("/agent/directives"))
                .json(&DirectiveRequest { text }),
        )
        .await
    }

    pub async fn search_memories(
        &self,
        query: &str,
        limit: usize,
        min_score: f32,
    ) -> Result<SearchResponse> {
        self.send(
            self.client
                .post(self.url("/memories/search"))
                .json(&SearchMemoriesRequest {
                    query,
                    limit,
                    min_score,
                }),
        )
        .await
    }

    pub async fn stats(&self) -> Result<StatsResponse> {
        self.send(self.client.get(self.url("/memories/stats"))).await
    }
}
