//! Consolidation Service - distills a window of memory into durable learnings
//!
//! A run holds the control loop, promotes important recent items into the
//! durable tier, summarizes the window day by day through the reasoning
//! provider, and writes one `ConsolidatedLearning` per day-group.
//!
//! The loop is released on every exit path, including errors and
//! cancellation, through a drop guard.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::application::{MemoryTieringService, ResilientCaller};
use crate::config::ConsolidationConfig;
use crate::domain::{ConsolidatedLearning, DomainError, MemoryItem, MemoryKind};
use crate::ports::{ConversationHandle, ReasoningProvider};

/// Characters of raw reasoning output kept when the response is unstructured
const FALLBACK_SUMMARY_CHARS: usize = 200;
const FALLBACK_CONFIDENCE: f32 = 0.6;

/// Markers stripped from listings so the model sees the substance only
const OUTCOME_MARKERS: [&str; 4] = ["SUCCESS:", "FAILURE:", "DECISION:", "REFLECTION:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationPhase {
    Idle,
    CollectingWindow,
    Summarizing,
    Writing,
}

/// Whatever consolidation holds while it runs (normally the control loop)
pub trait LoopPauser: Send + Sync {
    fn pause(&self);
    fn resume(&self);
}

/// Releases the hold and resets the phase when a run ends, however it ends
struct ResumeGuard<'a> {
    pauser: &'a dyn LoopPauser,
    phase: &'a Mutex<ConsolidationPhase>,
}

impl Drop for ResumeGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = ConsolidationPhase::Idle;
        }
        self.pauser.resume();
    }
}

/// Outcome counters for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub items_reviewed: usize,
    pub promoted: usize,
    pub duplicates_skipped: usize,
    /// Items left out because an earlier learning already covers them
    pub already_summarized: usize,
    pub groups_summarized: usize,
    pub fallback_parses: usize,
    pub learning_ids: Vec<String>,
    pub duration_ms: u64,
}

/// Structured fields the analysis prompt asks for
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LearningDraft {
    pub topic: String,
    pub summary: String,
    #[serde(default)]
    pub insights: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Result of reading a reasoning response; never an error
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Structured(LearningDraft),
    Fallback(LearningDraft),
}

impl ParseOutcome {
    pub fn draft(&self) -> &LearningDraft {
        match self {
            ParseOutcome::Structured(d) | ParseOutcome::Fallback(d) => d,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback(_))
    }
}

/// Read `{topic, summary, insights, confidence}` out of a model response,
/// tolerating prose or code fences around the JSON object.
pub fn parse_learning_response(raw: &str, default_topic: &str) -> ParseOutcome {
    let structured = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<LearningDraft>(&raw[start..=end]).ok()
        }
        _ => None,
    };

    match structured {
        Some(draft) if !draft.summary.trim().is_empty() => ParseOutcome::Structured(draft),
        _ => {
            let summary: String = raw.trim().chars().take(FALLBACK_SUMMARY_CHARS).collect();
            ParseOutcome::Fallback(LearningDraft {
                topic: default_topic.to_string(),
                summary,
                insights: BTreeMap::new(),
                confidence: Some(FALLBACK_CONFIDENCE),
            })
        }
    }
}

fn normalize_content(content: &str) -> String {
    content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn strip_markers(text: &str) -> &str {
    let trimmed = text.trim_start();
    OUTCOME_MARKERS
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .unwrap_or(trimmed)
        .trim()
}

fn analysis_prompt(day: NaiveDate, items: &[MemoryItem]) -> String {
    let listing = items
        .iter()
        .map(|item| {
            format!(
                "- [{}] {}: {}",
                item.timestamp.format("%H:%M"),
                item.kind,
                strip_markers(&item.summary)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are consolidating the working memory of an autonomous agent.
Below are the entries recorded on {day}. Identify the recurring theme, what worked,
what failed, and anything worth remembering long term.

Entries:
{listing}

Respond with a single JSON object and nothing else:
{{"topic": "<short topic>", "summary": "<2-4 sentences>", "insights": {{"<name>": "<finding>"}}, "confidence": <0.0-1.0>}}"#
    )
}

/// Periodic memory consolidation
pub struct ConsolidationService {
    tiering: Arc<MemoryTieringService>,
    reasoning: Arc<dyn ReasoningProvider>,
    inference: ResilientCaller,
    config: ConsolidationConfig,
    phase: Mutex<ConsolidationPhase>,
    last_run: Mutex<Instant>,
}

impl ConsolidationService {
    pub fn new(
        tiering: Arc<MemoryTieringService>,
        reasoning: Arc<dyn ReasoningProvider>,
        inference: ResilientCaller,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            tiering,
            reasoning,
            inference,
            config,
            phase: Mutex::new(ConsolidationPhase::Idle),
            last_run: Mutex::new(Instant::now()),
        }
    }

    pub fn phase(&self) -> ConsolidationPhase {
        self.phase
            .lock()
            .map(|p| *p)
            .unwrap_or(ConsolidationPhase::Idle)
    }

    fn set_phase(&self, phase: ConsolidationPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    /// Iteration-count trigger, or wall-clock interval when configured
    pub fn should_run(&self, iteration_count: u64) -> bool {
        let every = self.config.every_iterations;
        if every > 0 && iteration_count > 0 && iteration_count % every == 0 {
            return true;
        }
        match (self.config.interval(), self.last_run.lock()) {
            (Some(interval), Ok(last)) => last.elapsed() >= interval,
            _ => false,
        }
    }

    /// One full run. The pauser is resumed exactly once on every path.
    pub async fn run(
        &self,
        pauser: &dyn LoopPauser,
        cancel: &CancellationToken,
    ) -> Result<ConsolidationReport, DomainError> {
        pauser.pause();
        let _guard = ResumeGuard {
            pauser,
            phase: &self.phase,
        };
        if let Ok(mut last) = self.last_run.lock() {
            *last = Instant::now();
        }

        let started = Instant::now();
        tracing::info!("🧠 Consolidation started");

        let conversation = ConversationHandle::ephemeral("consolidation");
        let result = self.run_phases(&conversation, cancel).await;
        self.reasoning.forget(&conversation).await;

        let mut report = result?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "🧠 Consolidation finished: {} reviewed, {} promoted, {} duplicates, {} learnings ({}ms)",
            report.items_reviewed,
            report.promoted,
            report.duplicates_skipped,
            report.learning_ids.len(),
            report.duration_ms
        );
        Ok(report)
    }

    async fn run_phases(
        &self,
        conversation: &ConversationHandle,
        cancel: &CancellationToken,
    ) -> Result<ConsolidationReport, DomainError> {
        let mut report = ConsolidationReport::default();
        let storage = self.tiering.storage_caller();
        let recent_store = self.tiering.recent();
        let durable_store = self.tiering.durable();
        let window = self.config.window_size;

        // Collecting
        self.set_phase(ConsolidationPhase::CollectingWindow);
        let purged = storage
            .call("recent.purge_expired", cancel, || recent_store.purge_expired())
            .await?;
        if purged > 0 {
            tracing::debug!("🧹 Purged {} expired recent items", purged);
        }
        let recent = storage
            .call("recent.list_recent", cancel, || recent_store.list_recent(window))
            .await?;
        let durable = storage
            .call("durable.list_recent", cancel, || durable_store.list_recent(window))
            .await?;

        self.promote(&recent, &mut report, cancel).await?;

        let covered: HashSet<String> = durable
            .iter()
            .flat_map(ConsolidatedLearning::sources_of)
            .collect();

        let mut seen = HashSet::new();
        let mut groups: BTreeMap<NaiveDate, Vec<MemoryItem>> = BTreeMap::new();
        for item in recent.into_iter().chain(durable) {
            if item.kind == MemoryKind::Learning || !seen.insert(item.id.clone()) {
                continue;
            }
            if covered.contains(&item.id) {
                report.already_summarized += 1;
                continue;
            }
            groups
                .entry(item.timestamp.date_naive())
                .or_default()
                .push(item);
        }
        report.items_reviewed = seen.len();

        // Summarizing
        self.set_phase(ConsolidationPhase::Summarizing);
        let mut learnings = Vec::new();
        for (day, mut items) in groups.into_iter().rev().take(self.config.max_groups) {
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
            let prompt = analysis_prompt(day, &items);

            let response = self
                .inference
                .call("reasoning.consolidate", cancel, || {
                    self.reasoning.infer(&prompt, conversation)
                })
                .await?;

            let outcome = parse_learning_response(&response, &format!("Activity on {}", day));
            if outcome.is_fallback() {
                report.fallback_parses += 1;
                tracing::warn!("⚠️  Unstructured consolidation response for {}, using raw text", day);
            }
            let draft = outcome.draft().clone();
            let insights = draft
                .insights
                .into_iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect();
            let sources: BTreeSet<String> = items.iter().map(|i| i.id.clone()).collect();
            learnings.push(ConsolidatedLearning::new(
                draft.topic,
                draft.summary,
                insights,
                draft.confidence.unwrap_or(FALLBACK_CONFIDENCE),
                sources,
            ));
            report.groups_summarized += 1;
        }

        // Writing
        self.set_phase(ConsolidationPhase::Writing);
        for learning in learnings {
            let id = self
                .tiering
                .record_durable(learning.to_memory_item(), cancel)
                .await?;
            tracing::debug!("💡 Learning written: {} ({})", learning.topic, id);
            report.learning_ids.push(id);
        }

        Ok(report)
    }

    /// Copy important, settled recent items into the durable tier
    async fn promote(
        &self,
        recent: &[MemoryItem],
        report: &mut ConsolidationReport,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        let min_age = self.config.min_age_before_promotion();
        let mut candidates: Vec<&MemoryItem> = recent
            .iter()
            .filter(|item| {
                !item.is_promoted()
                    && item.importance >= self.config.promotion_threshold
                    && item.age() >= min_age
            })
            .collect();
        candidates.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let mut seen_content = HashSet::new();
        let scorer = self.tiering.scorer();
        let storage = self.tiering.storage_caller();
        let recent_store = self.tiering.recent();

        for item in candidates {
            if !seen_content.insert(normalize_content(&item.content)) {
                report.duplicates_skipped += 1;
                continue;
            }

            if item.kind == MemoryKind::Success {
                let existing = self
                    .tiering
                    .find_similar_completed_task(&item.content, cancel)
                    .await?;
                if let Some(existing) = existing {
                    tracing::debug!(
                        "🔁 {} already known as {} ({:.2})",
                        item.id,
                        existing.item.id,
                        existing.score
                    );
                    report.duplicates_skipped += 1;
                    continue;
                }
            }

            let mut copy = item.clone();
            copy.promoted_at = None;
            copy.embedding = None;
            scorer.rescore_for_promotion(&mut copy);
            self.tiering.record_durable(copy, cancel).await?;

            let mut marked = item.clone();
            marked.promoted_at = Some(Utc::now());
            let still_live = storage
                .call("recent.update", cancel, || {
                    recent_store.update(&item.id, marked.clone())
                })
                .await?;
            if !still_live {
                tracing::debug!("⏳ {} expired before it could be marked", item.id);
            }
            report.promoted += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDurableStore, InMemoryRecentStore, InMemorySemanticIndex};
    use crate::config::TieringConfig;
    use crate::domain::Collection;
    use crate::ports::SemanticIndex;
    use crate::testing::{ScriptedReasoner, StubEmbedding};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingPauser {
        pauses: AtomicU32,
        resumes: AtomicU32,
    }

    impl LoopPauser for CountingPauser {
        fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
        fn resume(&self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }
    }

    const STRUCTURED: &str = r#"Here you go:
```json
{"topic": "Cache tuning", "summary": "Restarts fixed stale entries.", "insights": {"fix": "restart", "runs": 3}, "confidence": 0.8}
```"#;

    fn tiering(semantic: Option<Arc<dyn SemanticIndex>>) -> Arc<MemoryTieringService> {
        Arc::new(MemoryTieringService::new(
            Arc::new(InMemoryRecentStore::with_limits(100, Duration::from_secs(3600))),
            Arc::new(InMemoryDurableStore::new()),
            semantic,
            TieringConfig::default(),
            ResilientCaller::storage(),
            ResilientCaller::storage(),
        ))
    }

    fn eager_config(threshold: f32) -> ConsolidationConfig {
        ConsolidationConfig {
            promotion_threshold: threshold,
            min_age_before_promotion_secs: 0,
            ..Default::default()
        }
    }

    fn quick_inference() -> ResilientCaller {
        ResilientCaller::new(crate::application::RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            total_budget_ms: 1_000,
        })
    }

    #[tokio::test]
    async fn test_failing_reasoning_still_resumes_once() {
        let tiering = tiering(None);
        let cancel = CancellationToken::new();
        tiering
            .record(MemoryItem::new(MemoryKind::Observation, "queue depth 40"), &cancel)
            .await
            .unwrap();

        let service = ConsolidationService::new(
            tiering,
            Arc::new(ScriptedReasoner::failing(DomainError::Transient("503".into()))),
            quick_inference(),
            eager_config(0.7),
        );
        let pauser = CountingPauser::default();

        let result = service.run(&pauser, &cancel).await;

        assert!(matches!(result, Err(DomainError::RetryExhausted { .. })));
        assert_eq!(pauser.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(pauser.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(service.phase(), ConsolidationPhase::Idle);
    }

    #[tokio::test]
    async fn test_only_important_duplicate_is_promoted() {
        let tiering = tiering(None);
        let cancel = CancellationToken::new();
        let high = tiering
            .record(
                MemoryItem::new(MemoryKind::Observation, "restart the cache").with_importance(0.9),
                &cancel,
            )
            .await
            .unwrap();
        let low = tiering
            .record(
                MemoryItem::new(MemoryKind::Observation, "restart the cache").with_importance(0.4),
                &cancel,
            )
            .await
            .unwrap();

        let service = ConsolidationService::new(
            tiering.clone(),
            Arc::new(ScriptedReasoner::replying(STRUCTURED)),
            quick_inference(),
            eager_config(0.5),
        );
        let pauser = CountingPauser::default();
        let report = service.run(&pauser, &cancel).await.unwrap();

        assert_eq!(report.promoted, 1);
        assert!(tiering.durable().get(&high.id).await.unwrap().is_some());
        assert!(tiering.durable().get(&low.id).await.unwrap().is_none());

        let marked = tiering.recent().get(&high.id).await.unwrap().unwrap();
        assert!(marked.is_promoted());
        assert_eq!(pauser.resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_learning_written_per_day_group() {
        let tiering = tiering(None);
        let cancel = CancellationToken::new();
        for text in ["cpu spike at noon", "cpu settled"] {
            tiering
                .record(MemoryItem::new(MemoryKind::Observation, text), &cancel)
                .await
                .unwrap();
        }

        let reasoner = Arc::new(ScriptedReasoner::replying(STRUCTURED));
        let service = ConsolidationService::new(
            tiering.clone(),
            reasoner.clone(),
            quick_inference(),
            eager_config(0.7),
        );
        let report = service
            .run(&CountingPauser::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(report.groups_summarized, 1);
        assert_eq!(report.learning_ids.len(), 1);
        assert_eq!(report.fallback_parses, 0);

        let learning = tiering
            .durable()
            .get(&report.learning_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(learning.kind, MemoryKind::Learning);
        assert!(learning.content.contains("Cache tuning"));
        assert!(learning.content.contains("runs: 3"));

        let prompts = reasoner.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("cpu spike at noon"));
    }

    #[tokio::test]
    async fn test_known_success_is_not_promoted_again() {
        let embedding = Arc::new(StubEmbedding::new(2));
        embedding.set("deployed api v2", vec![1.0, 0.0]);
        embedding.set("deployed the api", vec![1.0, 0.0]);
        let index = Arc::new(InMemorySemanticIndex::new(embedding));
        let tiering = tiering(Some(index.clone()));
        let cancel = CancellationToken::new();

        index
            .index(
                &MemoryItem::new(MemoryKind::Success, "deployed api v2"),
                Collection::LongTerm,
            )
            .await
            .unwrap();
        tiering
            .record(MemoryItem::new(MemoryKind::Success, "deployed the api"), &cancel)
            .await
            .unwrap();

        let service = ConsolidationService::new(
            tiering.clone(),
            Arc::new(ScriptedReasoner::replying(STRUCTURED)),
            quick_inference(),
            eager_config(0.5),
        );
        let report = service
            .run(&CountingPauser::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(report.promoted, 0);
        assert_eq!(report.duplicates_skipped, 1);
        tiering.shutdown().await;
    }

    #[tokio::test]
    async fn test_learning_stored_with_learning_importance() {
        let tiering = tiering(None);
        let cancel = CancellationToken::new();
        tiering
            .record(MemoryItem::new(MemoryKind::Observation, "queue depth 40"), &cancel)
            .await
            .unwrap();

        let service = ConsolidationService::new(
            tiering.clone(),
            Arc::new(ScriptedReasoner::replying(STRUCTURED)),
            quick_inference(),
            eager_config(0.7),
        );
        let report = service
            .run(&CountingPauser::default(), &cancel)
            .await
            .unwrap();

        let learning = tiering
            .durable()
            .get(&report.learning_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(learning.kind, MemoryKind::Learning);
        assert!(learning.importance >= 0.9, "importance was {}", learning.importance);
    }

    #[tokio::test]
    async fn test_second_run_skips_summarized_items() {
        let tiering = tiering(None);
        let cancel = CancellationToken::new();
        for text in ["cpu spike at noon", "cpu settled"] {
            tiering
                .record(MemoryItem::new(MemoryKind::Observation, text), &cancel)
                .await
                .unwrap();
        }

        let reasoner = Arc::new(ScriptedReasoner::replying(STRUCTURED));
        let service = ConsolidationService::new(
            tiering.clone(),
            reasoner.clone(),
            quick_inference(),
            eager_config(0.7),
        );
        let pauser = CountingPauser::default();

        let first = service.run(&pauser, &cancel).await.unwrap();
        assert_eq!(first.learning_ids.len(), 1);

        let second = service.run(&pauser, &cancel).await.unwrap();
        assert!(second.learning_ids.is_empty());
        assert_eq!(second.already_summarized, 2);
        assert_eq!(reasoner.prompts().len(), 1);

        tiering
            .record(MemoryItem::new(MemoryKind::Observation, "memory leak in worker"), &cancel)
            .await
            .unwrap();
        let third = service.run(&pauser, &cancel).await.unwrap();
        assert_eq!(third.learning_ids.len(), 1);

        let prompts = reasoner.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("memory leak in worker"));
        assert!(!prompts[1].contains("cpu settled"));
        assert_eq!(tiering.durable().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_should_run_after_interval_elapses() {
        let service = ConsolidationService::new(
            tiering(None),
            Arc::new(ScriptedReasoner::replying(STRUCTURED)),
            quick_inference(),
            ConsolidationConfig {
                every_iterations: 0,
                interval_secs: Some(1),
                ..Default::default()
            },
        );
        assert!(!service.should_run(0));
        assert!(!service.should_run(10));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(service.should_run(3));

        service
            .run(&CountingPauser::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!service.should_run(3));
    }

    #[test]
    fn test_parse_structured_response() {
        let outcome = parse_learning_response(STRUCTURED, "fallback topic");
        assert!(!outcome.is_fallback());
        let draft = outcome.draft();
        assert_eq!(draft.topic, "Cache tuning");
        assert_eq!(draft.confidence, Some(0.8));
        assert_eq!(draft.insights.len(), 2);
    }

    #[test]
    fn test_parse_fallback_keeps_first_200_chars() {
        let raw = "x".repeat(500);
        let outcome = parse_learning_response(&raw, "Activity on 2026-10-16");
        assert!(outcome.is_fallback());
        let draft = outcome.draft();
        assert_eq!(draft.summary.chars().count(), 200);
        assert_eq!(draft.confidence, Some(0.6));
        assert_eq!(draft.topic, "Activity on 2026-10-16");

        assert!(parse_learning_response("{ not json }", "t").is_fallback());
    }

    #[test]
    fn test_should_run_on_iteration_multiple() {
        let service = ConsolidationService::new(
            tiering(None),
            Arc::new(ScriptedReasoner::replying("")),
            ResilientCaller::inference(),
            ConsolidationConfig::default(),
        );
        assert!(!service.should_run(0));
        assert!(!service.should_run(5));
        assert!(service.should_run(10));
        assert!(service.should_run(20));
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(strip_markers("SUCCESS: rolled back"), "rolled back");
        assert_eq!(strip_markers("plain note"), "plain note");
    }
}
