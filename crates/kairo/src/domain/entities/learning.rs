//! ConsolidatedLearning - Knowledge distilled from a window of memory

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::entities::MemoryItem;
use crate::domain::value_objects::MemoryKind;

/// ConsolidatedLearning - created only by consolidation, never mutated afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedLearning {
    pub id: String,
    pub topic: String,
    pub summary: String,
    #[serde(default)]
    pub insights: BTreeMap<String, String>,
    /// Confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Weak references; the learning does not own its sources
    #[serde(default)]
    pub source_item_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl ConsolidatedLearning {
    pub fn new(
        topic: impl Into<String>,
        summary: impl Into<String>,
        insights: BTreeMap<String, String>,
        confidence: f32,
        source_item_ids: BTreeSet<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            summary: summary.into(),
            insights,
            confidence: confidence.clamp(0.0, 1.0),
            source_item_ids,
            created_at: Utc::now(),
        }
    }

    /// Render as a Learning-kind item for the durable tier
    pub fn to_memory_item(&self) -> MemoryItem {
        let mut content = format!("## {}\n\n{}", self.topic, self.summary);
        if !self.insights.is_empty() {
            content.push_str("\n\n### Insights\n");
            for (key, value) in &self.insights {
                content.push_str(&format!("- {}: {}\n", key, value));
            }
        }

        let mut item = MemoryItem::new(MemoryKind::Learning, content)
            .with_summary(format!("{}: {}", self.topic, crate::domain::summarize(&self.summary)))
            .with_tags(["consolidated", "learning"])
            .with_metadata(json!({
                "learning_id": self.id,
                "topic": self.topic,
                "insights": self.insights,
                "confidence": self.confidence,
                "source_item_ids": self.source_item_ids,
            }));
        item.id = self.id.clone();
        item.timestamp = self.created_at;
        item
    }

    /// Source ids recorded on a Learning-kind item; empty for any other item
    pub fn sources_of(item: &MemoryItem) -> BTreeSet<String> {
        if item.kind != MemoryKind::Learning {
            return BTreeSet::new();
        }
        item.metadata
            .as_ref()
            .and_then(|meta| meta.get("source_item_ids"))
            .and_then(|ids| ids.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_item_carries_learning_identity() {
        let mut insights = BTreeMap::new();
        insights.insert("root_cause".to_string(), "log rotation disabled".to_string());
        let sources: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let learning =
            ConsolidatedLearning::new("Disk pressure", "Disk fills nightly", insights, 1.4, sources);

        assert_eq!(learning.confidence, 1.0);

        let item = learning.to_memory_item();
        assert_eq!(item.id, learning.id);
        assert_eq!(item.kind, MemoryKind::Learning);
        assert!(item.content.contains("root_cause: log rotation disabled"));
        assert!(item.tags.contains("consolidated"));
        assert_eq!(ConsolidatedLearning::sources_of(&item), learning.source_item_ids);
        let meta = item.metadata.unwrap();
        assert_eq!(meta["source_item_ids"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_sources_only_read_from_learnings() {
        let observation = MemoryItem::new(MemoryKind::Observation, "disk 91%")
            .with_metadata(json!({ "source_item_ids": ["a"] }));
        assert!(ConsolidatedLearning::sources_of(&observation).is_empty());

        let bare = MemoryItem::new(MemoryKind::Learning, "hand-written note");
        assert!(ConsolidatedLearning::sources_of(&bare).is_empty());
    }
}
