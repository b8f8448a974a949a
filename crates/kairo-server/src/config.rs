//! Server configuration read from Shuttle secrets
//!
//! Agent tuning (loop interval, thresholds, retry budgets) is handled by
//! `kairo::AgentConfig::from_lookup`; this covers infrastructure only.

const DEFAULT_COLLECTION_PREFIX: &str = "kairo";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Infrastructure settings
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Bearer token for protected routes; `None` disables auth
    pub api_key: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub collection_prefix: String,
    pub openai_api_key: Option<String>,
    pub embedding_dimensions: usize,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    /// Start the control loop on boot
    pub autostart: bool,
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_key: non_empty("KAIRO_API_KEY"),
            qdrant_url: non_empty("QDRANT_URL"),
            qdrant_api_key: non_empty("QDRANT_API_KEY"),
            collection_prefix: non_empty("QDRANT_COLLECTION_PREFIX")
                .unwrap_or_else(|| DEFAULT_COLLECTION_PREFIX.to_string()),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            embedding_dimensions: non_empty("EMBEDDING_DIMENSIONS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|d: &usize| *d > 0)
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL"),
            autostart: non_empty("LOOP_AUTOSTART")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ServerConfig::from_lookup(|_| None);
        assert_eq!(config.collection_prefix, "kairo");
        assert_eq!(config.embedding_dimensions, 1536);
        assert!(config.api_key.is_none());
        assert!(config.autostart);
    }

    #[test]
    fn test_blank_and_invalid_values_fall_back() {
        let secrets: HashMap<&str, &str> = [
            ("KAIRO_API_KEY", "  "),
            ("EMBEDDING_DIMENSIONS", "zero"),
            ("QDRANT_URL", "http://localhost:6334"),
            ("LOOP_AUTOSTART", "false"),
        ]
        .into_iter()
        .collect();

        let config = ServerConfig::from_lookup(|k| secrets.get(k).map(|v| v.to_string()));
        assert!(config.api_key.is_none());
        assert_eq!(config.embedding_dimensions, 1536);
        assert_eq!(config.qdrant_url.as_deref(), Some("http://localhost:6334"));
        assert!(!config.autostart);
    }
}
