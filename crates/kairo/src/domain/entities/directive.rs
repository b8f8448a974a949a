//! Directive - A human-submitted instruction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directive - alters the loop's working goal once accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub id: String,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

impl Directive {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            submitted_at: Utc::now(),
        }
    }
}
