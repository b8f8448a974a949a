//! Agent Context - explicitly constructed wiring for every component
//!
//! Built once at startup and handed to whoever needs it (the HTTP layer,
//! tests). Nothing in the crate reaches for global state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::adapters::{InMemoryDurableStore, InMemoryRecentStore, InMemorySemanticIndex};
use crate::application::{
    ConsolidationService, ControlLoop, HumanDirectiveQueue, MemorySearchResponse, MemoryStats,
    MemoryTieringService, ResilientCaller,
};
use crate::config::AgentConfig;
use crate::domain::{DomainError, LoopStatus};
use crate::ports::{
    DurableMemoryStore, EmbeddingService, ReasoningProvider, RecentMemoryStore, SemanticIndex,
};

/// Storage and capability implementations chosen by the host process
pub struct AgentComponents {
    pub recent: Arc<dyn RecentMemoryStore>,
    pub durable: Arc<dyn DurableMemoryStore>,
    /// `None` disables semantic retrieval; keyword search is used instead
    pub semantic: Option<Arc<dyn SemanticIndex>>,
    pub reasoning: Arc<dyn ReasoningProvider>,
}

impl AgentComponents {
    /// Everything in-process; semantic retrieval only when an embedder is given
    pub fn in_memory(
        config: &AgentConfig,
        embedding: Option<Arc<dyn EmbeddingService>>,
        reasoning: Arc<dyn ReasoningProvider>,
    ) -> Self {
        Self {
            recent: Arc::new(InMemoryRecentStore::new(&config.recent)),
            durable: Arc::new(InMemoryDurableStore::new()),
            semantic: embedding
                .map(|e| Arc::new(InMemorySemanticIndex::new(e)) as Arc<dyn SemanticIndex>),
            reasoning,
        }
    }
}

/// The assembled agent
pub struct AgentContext {
    pub config: AgentConfig,
    pub tiering: Arc<MemoryTieringService>,
    pub consolidation: Arc<ConsolidationService>,
    pub directives: Arc<HumanDirectiveQueue>,
    pub control_loop: Arc<ControlLoop>,
    shutdown: CancellationToken,
}

impl AgentContext {
    /// Wire the components together. Must be called inside a tokio runtime.
    pub fn build(config: AgentConfig, components: AgentComponents) -> Self {
        let shutdown = CancellationToken::new();
        let storage = ResilientCaller::new(config.storage_retry.clone());
        let inference = ResilientCaller::new(config.inference_retry.clone());

        let tiering = Arc::new(MemoryTieringService::new(
            components.recent,
            components.durable,
            components.semantic,
            config.tiering.clone(),
            storage,
            inference.clone(),
        ));
        let consolidation = Arc::new(ConsolidationService::new(
            tiering.clone(),
            components.reasoning.clone(),
            inference.clone(),
            config.consolidation.clone(),
        ));
        let directives = Arc::new(HumanDirectiveQueue::new());
        let control_loop = Arc::new(ControlLoop::new(
            tiering.clone(),
            consolidation.clone(),
            components.reasoning,
            directives.clone(),
            inference,
            config.control_loop.clone(),
            shutdown.clone(),
        ));

        Self {
            config,
            tiering,
            consolidation,
            directives,
            control_loop,
            shutdown,
        }
    }

    /// Token cancelled by `shutdown`; hand it to request-scoped work
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn start(&self) -> Result<(), DomainError> {
        self.control_loop.start()
    }

    pub fn status(&self) -> LoopStatus {
        self.control_loop.status()
    }

    pub fn submit_directive(&self, text: &str) -> Result<String, DomainError> {
        self.directives.submit(text)
    }

    pub async fn search_memories(
        &self,
        query: &str,
        max_results: usize,
        min_score: f32,
    ) -> MemorySearchResponse {
        self.tiering
            .search_memories(query, max_results, min_score, &self.shutdown)
            .await
    }

    pub async fn memory_stats(&self) -> Result<MemoryStats, DomainError> {
        self.tiering.stats().await
    }

    /// Stop the loop, then drain background index writes
    pub async fn shutdown(&self) {
        tracing::info!("🛑 Shutting down agent");
        self.control_loop.stop().await;
        self.shutdown.cancel();
        self.tiering.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedReasoner, StubEmbedding};

    #[tokio::test]
    async fn test_in_memory_agent_end_to_end() {
        let mut config = AgentConfig::default();
        config.control_loop.iteration_delay_ms = 5;
        config.consolidation.every_iterations = 0;

        let components = AgentComponents::in_memory(
            &config,
            Some(Arc::new(StubEmbedding::new(4))),
            Arc::new(ScriptedReasoner::replying("SUCCESS: checked the queue")),
        );
        let agent = AgentContext::build(config, components);

        let id = agent.submit_directive("check the queue").unwrap();
        assert!(!id.is_empty());
        agent.start().unwrap();
        assert!(agent.start().is_err());

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while agent.status().iteration_count < 2 {
            assert!(std::time::Instant::now() < deadline);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        agent.shutdown().await;
        assert!(!agent.status().is_running);

        let stats = agent.memory_stats().await.unwrap();
        assert!(stats.semantic_enabled);
        assert!(stats.recent_count >= 3);
    }
}
