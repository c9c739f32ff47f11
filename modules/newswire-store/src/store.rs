//! Consumer contract over the persistent article/cluster/alert store.
//!
//! The pipeline treats the store as a document repository with indexed
//! queries; it is the single source of truth for all mutable cross-stage
//! state. Everything the admin surface reads or writes is expressible
//! through this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use newswire_common::{
    Alert, AlertStatus, Article, ChannelResult, Cluster, DuplicateLink, Feed, Metric, Result,
    StoredEmbedding,
};

/// Time-windowed candidate retrieval parameters for the dedup engine.
/// The window start is inclusive; candidates must share at least one of
/// source, category, or any tag with the article under test.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub exclude_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub source: String,
    pub category: String,
    pub tags: Vec<String>,
    pub limit: usize,
}

/// One-shot flag update written atomically when an article finishes
/// duplicate checking.
#[derive(Debug, Clone)]
pub struct ArticleFlags {
    pub article_id: Uuid,
    pub duplicate_checked: bool,
    pub is_duplicate: bool,
    pub original_article_id: Option<Uuid>,
    pub processed_at: DateTime<Utc>,
}

/// Rows removed by one TTL sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactionStats {
    pub articles_removed: u64,
    pub clusters_removed: u64,
    pub embeddings_removed: u64,
    pub alerts_removed: u64,
}

/// Retention horizons enforced by `compact`.
pub const ARTICLE_RETENTION_DAYS: i64 = 90;
pub const CLUSTER_INACTIVITY_DAYS: i64 = 7;
pub const EMBEDDING_TTL_DAYS: i64 = 7;
pub const ALERT_RETENTION_DAYS: i64 = 30;

#[async_trait]
pub trait Store: Send + Sync {
    // --- Articles ---

    /// Insert a new article. Fails if the URL is already present.
    async fn put_article(&self, article: &Article) -> Result<()>;
    async fn find_article(&self, id: Uuid) -> Result<Option<Article>>;
    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>>;
    async fn find_article_by_hash(&self, hash: &str) -> Result<Option<Article>>;
    async fn find_candidate_articles(&self, query: &CandidateQuery) -> Result<Vec<Article>>;
    /// Articles persisted but never duplicate-checked (restart recovery).
    async fn list_unchecked_articles(&self, limit: usize) -> Result<Vec<Article>>;
    async fn update_article_flags(&self, flags: &ArticleFlags) -> Result<()>;
    async fn mark_alert_sent(&self, article_id: Uuid) -> Result<()>;
    /// Full-text search over title, content, summary, and entity names.
    async fn search_articles(&self, query: &str, limit: usize) -> Result<Vec<Article>>;

    // --- Duplicate links ---

    /// Insert a link. `(original, duplicate)` is unique; a repeat insert is
    /// a no-op.
    async fn put_duplicate_link(&self, link: &DuplicateLink) -> Result<()>;
    async fn list_duplicate_links_for(&self, original_id: Uuid) -> Result<Vec<DuplicateLink>>;

    // --- Clusters ---

    async fn put_cluster(&self, cluster: &Cluster) -> Result<()>;
    async fn update_cluster(&self, cluster: &Cluster) -> Result<()>;
    async fn delete_cluster(&self, id: Uuid) -> Result<()>;
    async fn find_cluster_containing(&self, article_id: Uuid) -> Result<Option<Cluster>>;
    async fn list_clusters_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Cluster>>;

    // --- Embeddings ---

    async fn put_embedding(&self, embedding: &StoredEmbedding) -> Result<()>;
    async fn find_embedding_by_article(&self, article_id: Uuid)
        -> Result<Option<StoredEmbedding>>;

    // --- Alerts ---

    async fn put_alert(&self, alert: &Alert) -> Result<()>;
    async fn find_alert(&self, id: Uuid) -> Result<Option<Alert>>;
    async fn update_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        sent_at: Option<DateTime<Utc>>,
        results: &[ChannelResult],
    ) -> Result<()>;
    /// Operator-initiated resend bookkeeping.
    async fn increment_alert_resend(&self, id: Uuid) -> Result<()>;
    async fn list_recent_alerts(&self, since: DateTime<Utc>) -> Result<Vec<Alert>>;
    async fn count_alerts_since(&self, since: DateTime<Utc>) -> Result<usize>;
    /// Alerts still `pending` (replayable after restart).
    async fn list_pending_alerts(&self) -> Result<Vec<Alert>>;

    // --- Feeds ---

    async fn upsert_feed(&self, feed: &Feed) -> Result<()>;
    async fn get_feed(&self, id: &str) -> Result<Option<Feed>>;
    async fn list_feeds(&self) -> Result<Vec<Feed>>;
    async fn record_feed_success(
        &self,
        id: &str,
        articles_processed: u64,
        at: DateTime<Utc>,
    ) -> Result<()>;
    async fn record_feed_error(&self, id: &str, error: &str, at: DateTime<Utc>) -> Result<()>;

    // --- Metrics / maintenance ---

    async fn put_metric(&self, metric: &Metric) -> Result<()>;
    /// Enforce the §3 TTL policies. Run periodically by the daemon.
    async fn compact(&self, now: DateTime<Utc>) -> Result<CompactionStats>;
}
