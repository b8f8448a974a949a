//! Agent configuration
//!
//! Every section has serde defaults, so a partial document (or none at all)
//! yields a working agent. `AgentConfig::from_lookup` overlays flat string
//! settings such as deployment secrets or environment variables.

use std::time::Duration;

use serde::Deserialize;

use crate::application::RetryPolicy;

/// Control loop timing
#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    /// Delay between iterations
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,
    /// Sleep slice while paused
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// Goal used when no directive has been accepted
    #[serde(default = "default_goal")]
    pub default_goal: String,
    #[serde(default = "default_max_recent")]
    pub context_max_recent: usize,
    #[serde(default = "default_max_relevant")]
    pub context_max_relevant: usize,
}

fn default_iteration_delay_ms() -> u64 {
    5_000
}

fn default_pause_poll_ms() -> u64 {
    200
}

fn default_goal() -> String {
    "Observe the environment and record anything noteworthy".to_string()
}

fn default_max_recent() -> usize {
    10
}

fn default_max_relevant() -> usize {
    5
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            iteration_delay_ms: default_iteration_delay_ms(),
            pause_poll_ms: default_pause_poll_ms(),
            default_goal: default_goal(),
            context_max_recent: default_max_recent(),
            context_max_relevant: default_max_relevant(),
        }
    }
}

impl LoopConfig {
    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms.max(1))
    }
}

/// Recent tier bounds
#[derive(Debug, Clone, Deserialize)]
pub struct RecentStoreConfig {
    #[serde(default = "default_recent_capacity")]
    pub capacity: usize,
    #[serde(default = "default_recent_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_recent_capacity() -> usize {
    1000
}

fn default_recent_ttl_secs() -> u64 {
    8 * 60 * 60
}

impl Default for RecentStoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_recent_capacity(),
            ttl_secs: default_recent_ttl_secs(),
        }
    }
}

impl RecentStoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Tiering and retrieval thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct TieringConfig {
    /// Long-term similarity floor for context building
    #[serde(default = "default_long_term_min_score")]
    pub long_term_min_score: f32,
    /// Similarity required to call a completed task a duplicate
    #[serde(default = "default_duplicate_task_min_score")]
    pub duplicate_task_min_score: f32,
    /// Items at or above this importance contribute full content to context
    #[serde(default = "default_full_content_importance")]
    pub full_content_importance: f32,
    /// Background index writer queue depth
    #[serde(default = "default_index_queue_capacity")]
    pub index_queue_capacity: usize,
}

fn default_long_term_min_score() -> f32 {
    0.75
}

fn default_duplicate_task_min_score() -> f32 {
    0.85
}

fn default_full_content_importance() -> f32 {
    0.8
}

fn default_index_queue_capacity() -> usize {
    256
}

impl Default for TieringConfig {
    fn default() -> Self {
        Self {
            long_term_min_score: default_long_term_min_score(),
            duplicate_task_min_score: default_duplicate_task_min_score(),
            full_content_importance: default_full_content_importance(),
            index_queue_capacity: default_index_queue_capacity(),
        }
    }
}

/// Consolidation trigger and promotion rules
#[derive(Debug, Clone, Deserialize)]
pub struct ConsolidationConfig {
    /// Run when iteration_count % every_iterations == 0 (0 disables)
    #[serde(default = "default_every_iterations")]
    pub every_iterations: u64,
    /// Run when this much wall-clock time has passed since the last run
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Items fetched from each tier per run
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Most recent day-groups summarized per run
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f32,
    #[serde(default = "default_min_age_secs")]
    pub min_age_before_promotion_secs: u64,
}

fn default_every_iterations() -> u64 {
    10
}

fn default_window_size() -> usize {
    50
}

fn default_max_groups() -> usize {
    7
}

fn default_promotion_threshold() -> f32 {
    0.7
}

fn default_min_age_secs() -> u64 {
    5 * 60
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            every_iterations: default_every_iterations(),
            interval_secs: None,
            window_size: default_window_size(),
            max_groups: default_max_groups(),
            promotion_threshold: default_promotion_threshold(),
            min_age_before_promotion_secs: default_min_age_secs(),
        }
    }
}

impl ConsolidationConfig {
    pub fn min_age_before_promotion(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.min_age_before_promotion_secs as i64)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }
}

/// Full agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub control_loop: LoopConfig,
    #[serde(default)]
    pub recent: RecentStoreConfig,
    #[serde(default)]
    pub tiering: TieringConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    #[serde(default = "RetryPolicy::storage")]
    pub storage_retry: RetryPolicy,
    #[serde(default = "RetryPolicy::inference")]
    pub inference_retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_loop: LoopConfig::default(),
            recent: RecentStoreConfig::default(),
            tiering: TieringConfig::default(),
            consolidation: ConsolidationConfig::default(),
            storage_retry: RetryPolicy::storage(),
            inference_retry: RetryPolicy::inference(),
        }
    }
}

impl AgentConfig {
    /// Defaults overlaid with flat string settings
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup);
        config
    }

    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_setting(&lookup, "LOOP_INTERVAL_MS") {
            self.control_loop.iteration_delay_ms = v;
        }
        if let Some(v) = parse_setting(&lookup, "LOOP_PAUSE_POLL_MS") {
            self.control_loop.pause_poll_ms = v;
        }
        if let Some(goal) = lookup("AGENT_GOAL").filter(|g| !g.trim().is_empty()) {
            self.control_loop.default_goal = goal;
        }
        if let Some(v) = parse_setting(&lookup, "RECENT_CAPACITY") {
            self.recent.capacity = v;
        }
        if let Some(v) = parse_setting(&lookup, "RECENT_TTL_SECS") {
            self.recent.ttl_secs = v;
        }
        if let Some(v) = parse_setting(&lookup, "LONG_TERM_MIN_SCORE") {
            self.tiering.long_term_min_score = v;
        }
        if let Some(v) = parse_setting(&lookup, "CONSOLIDATION_EVERY") {
            self.consolidation.every_iterations = v;
        }
        if let Some(v) = parse_setting(&lookup, "CONSOLIDATION_INTERVAL_SECS") {
            self.consolidation.interval_secs = Some(v);
        }
        if let Some(v) = parse_setting(&lookup, "PROMOTION_THRESHOLD") {
            self.consolidation.promotion_threshold = v;
        }
    }
}

fn parse_setting<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("⚠️  Ignoring unparsable setting {}={}", key, raw);
            None
        }
    }
}
