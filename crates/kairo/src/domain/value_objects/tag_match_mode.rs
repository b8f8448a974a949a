//! TagMatchMode - How to match tags in search filters

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Tag matching mode for search filtering
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TagMatchMode {
    /// Item carries at least one of the wanted tags
    #[default]
    Any,
    /// Item carries every wanted tag
    All,
}

impl TagMatchMode {
    /// An empty wanted list always matches.
    pub fn matches(&self, wanted: &[String], tags: &BTreeSet<String>) -> bool {
        if wanted.is_empty() {
            return true;
        }
        match self {
            TagMatchMode::Any => wanted.iter().any(|t| tags.contains(t)),
            TagMatchMode::All => wanted.iter().all(|t| tags.contains(t)),
        }
    }
}
