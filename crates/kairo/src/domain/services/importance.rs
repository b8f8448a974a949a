//! Importance scoring
//!
//! Deterministic rule: a base score per kind plus boosts for long content
//! and for items that carry an output.

use crate::domain::entities::MemoryItem;
use crate::domain::value_objects::MemoryKind;

const LONG_CONTENT_CHARS: usize = 500;
const VERY_LONG_CONTENT_CHARS: usize = 2000;
const LENGTH_BOOST: f32 = 0.1;
const OUTPUT_BOOST: f32 = 0.1;
const ACCESS_BOOST: f32 = 0.05;
const MAX_ACCESS_BOOST: f32 = 0.1;

/// Importance scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceScorer;

impl ImportanceScorer {
    pub fn base_score(kind: MemoryKind) -> f32 {
        match kind {
            MemoryKind::Observation => 0.3,
            MemoryKind::Decision => 0.5,
            MemoryKind::Failure => 0.6,
            MemoryKind::Success => 0.7,
            MemoryKind::Reflection => 0.8,
            MemoryKind::Learning => 0.9,
        }
    }

    /// Score a freshly written item
    pub fn score(&self, item: &MemoryItem) -> f32 {
        let mut score = Self::base_score(item.kind);

        let chars = item.content.chars().count();
        if chars > LONG_CONTENT_CHARS {
            score += LENGTH_BOOST;
        }
        if chars > VERY_LONG_CONTENT_CHARS {
            score += LENGTH_BOOST;
        }
        if item.has_output() {
            score += OUTPUT_BOOST;
        }

        score.min(1.0)
    }

    /// Apply the write-time rule without ever lowering a writer-supplied value
    pub fn apply(&self, item: &mut MemoryItem) {
        let score = self.score(item);
        item.raise_importance(score);
    }

    /// Consolidation re-scoring: items that keep being read become more important
    pub fn rescore_for_promotion(&self, item: &mut MemoryItem) {
        let boost = (item.access_count as f32 * ACCESS_BOOST).min(MAX_ACCESS_BOOST);
        let target = item.importance + boost;
        item.raise_importance(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_scores() {
        let scorer = ImportanceScorer;
        let obs = MemoryItem::new(MemoryKind::Observation, "cpu nominal");
        let refl = MemoryItem::new(MemoryKind::Reflection, "should batch writes");
        assert!((scorer.score(&obs) - 0.3).abs() < 1e-6);
        assert!((scorer.score(&refl) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_boosts_and_clamp() {
        let scorer = ImportanceScorer;
        let long = MemoryItem::new(MemoryKind::Success, "x".repeat(2500))
            .with_metadata(json!({ "output": "deployed" }));
        assert!((scorer.score(&long) - 1.0).abs() < 1e-6);

        let medium = MemoryItem::new(MemoryKind::Observation, "y".repeat(600));
        assert!((scorer.score(&medium) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_apply_keeps_writer_value() {
        let scorer = ImportanceScorer;
        let mut item = MemoryItem::new(MemoryKind::Observation, "alert").with_importance(0.95);
        scorer.apply(&mut item);
        assert!((item.importance - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_rescore_caps_access_boost() {
        let scorer = ImportanceScorer;
        let mut item = MemoryItem::new(MemoryKind::Decision, "rollback").with_importance(0.5);
        item.access_count = 10;
        scorer.rescore_for_promotion(&mut item);
        assert!((item.importance - 0.6).abs() < 1e-6);
    }
}
