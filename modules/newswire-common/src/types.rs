use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// How a duplicate pair was decided. Closed set so thresholding code can
/// match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    ContentHash,
    TitleSimilarity,
    ContentSimilarity,
    EntitySimilarity,
    SemanticSimilarity,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::ContentHash => write!(f, "content_hash"),
            DetectionMethod::TitleSimilarity => write!(f, "title_similarity"),
            DetectionMethod::ContentSimilarity => write!(f, "content_similarity"),
            DetectionMethod::EntitySimilarity => write!(f, "entity_similarity"),
            DetectionMethod::SemanticSimilarity => write!(f, "semantic_similarity"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Organization,
    Location,
    Money,
    Percentage,
    Date,
    Ticker,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Person => write!(f, "person"),
            EntityType::Organization => write!(f, "organization"),
            EntityType::Location => write!(f, "location"),
            EntityType::Money => write!(f, "money"),
            EntityType::Percentage => write!(f, "percentage"),
            EntityType::Date => write!(f, "date"),
            EntityType::Ticker => write!(f, "ticker"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Webhook,
    Email,
    Slack,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Webhook => write!(f, "webhook"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Slack => write!(f, "slack"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Pending => write!(f, "pending"),
            AlertStatus::Sent => write!(f, "sent"),
            AlertStatus::Failed => write!(f, "failed"),
            AlertStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// --- Entities ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f32,
}

// --- Article ---

/// A normalized news item. Created by the normalizer, mutated once by the
/// dedup engine to set flags and cluster linkage, never thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub summary: String,
    /// Full body text; None until full-page extraction runs (if ever).
    pub content: Option<String>,
    /// Feed name this item arrived from.
    pub source: String,
    pub source_id: String,
    pub category: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub language: Option<String>,
    pub entities: Vec<Entity>,
    pub content_hash: String,
    pub duplicate_checked: bool,
    pub is_duplicate: bool,
    pub original_article_id: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub alert_sent: bool,
}

impl Article {
    /// Title + body text the similarity signals operate on.
    pub fn comparable_text(&self) -> String {
        match &self.content {
            Some(c) if !c.is_empty() => format!("{} {}", self.title, c),
            _ => format!("{} {}", self.title, self.summary),
        }
    }

    pub fn body_text(&self) -> &str {
        match &self.content {
            Some(c) if !c.is_empty() => c,
            _ => &self.summary,
        }
    }

    pub fn word_count(&self) -> usize {
        self.body_text().split_whitespace().count()
    }

    pub fn entity_names_lower(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.name.to_lowercase()).collect()
    }
}

// --- Duplicate links ---

/// Per-signal scores for one scored pair, kept alongside the link so a
/// decision can be audited later.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    pub content_hash: f64,
    pub title: f64,
    pub content: f64,
    pub entity: f64,
    pub semantic: f64,
    pub temporal: f64,
    pub source_alignment: f64,
    pub overall: f64,
}

/// Directed edge from a duplicate article to its elected original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateLink {
    pub original_article_id: Uuid,
    pub duplicate_article_id: Uuid,
    pub similarity_score: f64,
    pub detection_method: DetectionMethod,
    pub breakdown: SimilarityBreakdown,
    pub original_title: String,
    pub duplicate_title: String,
    pub original_source: String,
    pub duplicate_source: String,
    pub time_delta_hours: f64,
    pub created_at: DateTime<Utc>,
}

// --- Clusters ---

/// Aggregated features over a cluster's members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCentroid {
    pub avg_word_count: f64,
    pub avg_entity_count: f64,
    pub common_categories: Vec<String>,
    pub common_tags: Vec<String>,
    pub source_distribution: BTreeMap<String, u32>,
    pub mean_published_at: DateTime<Utc>,
}

/// Equivalence class of articles judged to cover one story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub article_ids: Vec<Uuid>,
    pub centroid: ClusterCentroid,
    pub category: String,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Embeddings ---

/// Cached dense vector for an article. TTL-expired by compaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub article_id: Uuid,
    pub vector: Vec<f32>,
    pub model: String,
    pub text_length: usize,
    pub created_at: DateTime<Utc>,
}

// --- Alerts ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: ChannelKind,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

/// A queued or delivered notification derived from an elected-original
/// article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub article_id: Uuid,
    pub title: String,
    pub summary: String,
    pub source: String,
    pub category: String,
    pub priority: Priority,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub entities: Vec<Entity>,
    pub tags: Vec<String>,
    pub channels: Vec<ChannelKind>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub results: Vec<ChannelResult>,
    pub resend_count: u32,
}

// --- Feeds ---

/// RSS source configuration plus runtime counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub name: String,
    pub url: String,
    pub category: String,
    pub priority: Priority,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub articles_processed: u64,
    pub error_count: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

// --- Metrics ---

/// One recorded measurement, written fire-and-forget after each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl Metric {
    pub fn counter(name: &str, value: f64, recorded_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            value,
            labels: BTreeMap::new(),
            recorded_at,
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }
}
