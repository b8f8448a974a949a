//! MemoryItem - The atomic unit of recorded experience
//!
//! Pure domain entity without infrastructure dependencies.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::MemoryKind;

/// Maximum characters kept in an auto-generated summary
pub const SUMMARY_MAX_CHARS: usize = 160;

/// MemoryItem - A piece of recorded experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier, immutable
    pub id: String,
    /// Creation time, immutable
    pub timestamp: DateTime<Utc>,
    pub kind: MemoryKind,
    /// Full text
    pub content: String,
    /// Short text used when full content is not needed
    pub summary: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Importance score (0.0 - 1.0)
    pub importance: f32,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Set on the recent copy once consolidation has copied it into the durable tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,
    /// Derived by the semantic index, never edited by hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MemoryItem {
    /// Create a new item with generated ID and timestamp
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            summary: summarize(&content),
            content,
            tags: BTreeSet::new(),
            importance: 0.0,
            access_count: 0,
            last_accessed_at: None,
            promoted_at: None,
            embedding: None,
            metadata: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.add_tag(tag);
        }
        self
    }

    pub fn with_importance(mut self, importance: f32) -> Self {
        self.raise_importance(importance);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Tags only ever grow
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() {
            self.tags.insert(tag.to_string());
        }
    }

    /// Importance never decreases through this path
    pub fn raise_importance(&mut self, importance: f32) {
        let clamped = importance.clamp(0.0, 1.0);
        if clamped > self.importance {
            self.importance = clamped;
        }
    }

    /// Record a read that counts as use
    pub fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Some(Utc::now());
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.timestamp
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted_at.is_some()
    }

    /// Whether metadata carries a non-empty `output`
    pub fn has_output(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("output"))
            .map(|v| match v {
                serde_json::Value::Null => false,
                serde_json::Value::String(s) => !s.trim().is_empty(),
                _ => true,
            })
            .unwrap_or(false)
    }

    /// Case-insensitive substring match across content, summary and tags
    pub fn matches_keyword(&self, needle_lower: &str) -> bool {
        self.content.to_lowercase().contains(needle_lower)
            || self.summary.to_lowercase().contains(needle_lower)
            || self
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(needle_lower))
    }

    /// The text rendered into reasoning context: full content for important items
    pub fn context_text(&self, full_content_threshold: f32) -> &str {
        if self.importance >= full_content_threshold {
            &self.content
        } else {
            &self.summary
        }
    }
}

/// Build a short summary from full content (char-boundary safe)
pub fn summarize(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SUMMARY_MAX_CHARS {
        return flat;
    }
    let truncated: String = flat.chars().take(SUMMARY_MAX_CHARS).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_importance_only_rises() {
        let mut item = MemoryItem::new(MemoryKind::Observation, "disk at 91%").with_importance(0.6);
        item.raise_importance(0.4);
        assert_eq!(item.importance, 0.6);
        item.raise_importance(1.7);
        assert_eq!(item.importance, 1.0);
    }

    #[test]
    fn test_tags_append_only_and_deduplicated() {
        let mut item = MemoryItem::new(MemoryKind::Decision, "restart worker")
            .with_tags(["ops", "ops", " "]);
        item.add_tag("restart");
        assert_eq!(item.tags.len(), 2);
        assert!(item.tags.contains("ops"));
    }

    #[test]
    fn test_summary_truncates_long_content() {
        let long = "word ".repeat(100);
        let item = MemoryItem::new(MemoryKind::Observation, long);
        assert!(item.summary.ends_with("..."));
        assert!(item.summary.chars().count() <= SUMMARY_MAX_CHARS + 3);
    }

    #[test]
    fn test_has_output() {
        let item = MemoryItem::new(MemoryKind::Success, "done");
        assert!(!item.has_output());
        let item = item.with_metadata(json!({ "output": "  " }));
        assert!(!item.has_output());
        let item = item.with_metadata(json!({ "output": "ok" }));
        assert!(item.has_output());
    }

    #[test]
    fn test_touch_advances_access() {
        let mut item = MemoryItem::new(MemoryKind::Observation, "x");
        item.touch();
        item.touch();
        assert_eq!(item.access_count, 2);
        assert!(item.last_accessed_at.is_some());
    }
}
