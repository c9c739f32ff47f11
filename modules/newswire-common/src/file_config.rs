use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{Feed, Priority};

/// TOML-backed feed list. Secrets stay in env vars; this file only names
/// sources and fetch policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedsConfig {
    pub global: GlobalFeedConfig,
    #[serde(default)]
    pub feeds: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalFeedConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    pub category: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_enabled() -> bool {
    true
}

impl FeedEntry {
    /// Runtime feed record with zeroed counters.
    pub fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            name: self.name,
            url: self.url,
            category: self.category,
            priority: self.priority,
            enabled: self.enabled,
            tags: self.tags,
            last_fetched_at: None,
            articles_processed: 0,
            error_count: 0,
            last_error: None,
            last_error_at: None,
        }
    }
}

/// Load and parse the feeds TOML file.
pub fn load_feeds(path: &Path) -> Result<FeedsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read feeds file: {}", path.display()))?;
    let config: FeedsConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse feeds file: {}", path.display()))?;
    Ok(config)
}
