//! Collection - Named partitions of the semantic index

use serde::{Deserialize, Serialize};

/// Semantic index collection
///
/// `ShortTerm` mirrors the recent tier and is queried for "what just happened";
/// `LongTerm` mirrors the durable tier and is queried for "what I've learned".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    ShortTerm,
    LongTerm,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::ShortTerm, Collection::LongTerm];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::ShortTerm => "short-term",
            Collection::LongTerm => "long-term",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "short-term" => Ok(Collection::ShortTerm),
            "long-term" => Ok(Collection::LongTerm),
            _ => Err(format!("Unknown collection: {}", s)),
        }
    }
}
