//! In-memory store used by tests and local dry runs. Mirrors the Postgres
//! implementation's constraint behavior (unique URL, unique link pair).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use newswire_common::{
    Alert, AlertStatus, Article, ChannelResult, Cluster, DuplicateLink, Feed, Metric,
    NewswireError, Result, StoredEmbedding,
};

use crate::store::{
    ArticleFlags, CandidateQuery, CompactionStats, Store, ALERT_RETENTION_DAYS,
    ARTICLE_RETENTION_DAYS, CLUSTER_INACTIVITY_DAYS, EMBEDDING_TTL_DAYS,
};

#[derive(Default)]
struct Inner {
    articles: HashMap<Uuid, Article>,
    url_index: HashMap<String, Uuid>,
    links: Vec<DuplicateLink>,
    clusters: HashMap<Uuid, Cluster>,
    embeddings: HashMap<Uuid, StoredEmbedding>,
    alerts: HashMap<Uuid, Alert>,
    feeds: HashMap<String, Feed>,
    metrics: Vec<Metric>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: all recorded metrics by name.
    pub async fn metrics_named(&self, name: &str) -> Vec<Metric> {
        self.inner
            .read()
            .await
            .metrics
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    /// Test hook: every stored duplicate link.
    pub async fn all_links(&self) -> Vec<DuplicateLink> {
        self.inner.read().await.links.clone()
    }

    /// Test hook: every stored cluster.
    pub async fn all_clusters(&self) -> Vec<Cluster> {
        self.inner.read().await.clusters.values().cloned().collect()
    }

    /// Test hook: every stored alert.
    pub async fn all_alerts(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.values().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_article(&self, article: &Article) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.url_index.contains_key(&article.url) {
            return Err(NewswireError::Store(format!(
                "duplicate url: {}",
                article.url
            )));
        }
        inner.url_index.insert(article.url.clone(), article.id);
        inner.articles.insert(article.id, article.clone());
        Ok(())
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.inner.read().await.articles.get(&id).cloned())
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .url_index
            .get(url)
            .and_then(|id| inner.articles.get(id))
            .cloned())
    }

    async fn find_article_by_hash(&self, hash: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        let mut found: Option<&Article> = None;
        for article in inner.articles.values() {
            if article.content_hash == hash {
                // Earliest insertion wins, matching the Postgres ORDER BY
                let replace = match found {
                    Some(existing) => article.fetched_at < existing.fetched_at,
                    None => true,
                };
                if replace {
                    found = Some(article);
                }
            }
        }
        Ok(found.cloned())
    }

    async fn find_candidate_articles(&self, query: &CandidateQuery) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| a.id != query.exclude_id)
            .filter(|a| a.published_at >= query.window_start)
            .filter(|a| {
                a.source == query.source
                    || a.category == query.category
                    || a.tags.iter().any(|t| query.tags.contains(t))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        matches.truncate(query.limit);
        Ok(matches)
    }

    async fn list_unchecked_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut unchecked: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| !a.duplicate_checked)
            .cloned()
            .collect();
        unchecked.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at));
        unchecked.truncate(limit);
        Ok(unchecked)
    }

    async fn update_article_flags(&self, flags: &ArticleFlags) -> Result<()> {
        let mut inner = self.inner.write().await;
        let article = inner
            .articles
            .get_mut(&flags.article_id)
            .ok_or_else(|| NewswireError::Store(format!("no article {}", flags.article_id)))?;
        article.duplicate_checked = flags.duplicate_checked;
        article.is_duplicate = flags.is_duplicate;
        article.original_article_id = flags.original_article_id;
        article.processed_at = Some(flags.processed_at);
        Ok(())
    }

    async fn mark_alert_sent(&self, article_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(article) = inner.articles.get_mut(&article_id) {
            article.alert_sent = true;
        }
        Ok(())
    }

    async fn search_articles(&self, query: &str, limit: usize) -> Result<Vec<Article>> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        let mut hits: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a.summary.to_lowercase().contains(&needle)
                    || a.content
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&needle))
                    || a.entities
                        .iter()
                        .any(|e| e.name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn put_duplicate_link(&self, link: &DuplicateLink) -> Result<()> {
        if link.original_article_id == link.duplicate_article_id {
            return Err(NewswireError::Store(
                "duplicate link must not be self-referential".to_string(),
            ));
        }
        let mut inner = self.inner.write().await;
        let exists = inner.links.iter().any(|l| {
            l.original_article_id == link.original_article_id
                && l.duplicate_article_id == link.duplicate_article_id
        });
        if !exists {
            inner.links.push(link.clone());
        }
        Ok(())
    }

    async fn list_duplicate_links_for(&self, original_id: Uuid) -> Result<Vec<DuplicateLink>> {
        Ok(self
            .inner
            .read()
            .await
            .links
            .iter()
            .filter(|l| l.original_article_id == original_id)
            .cloned()
            .collect())
    }

    async fn put_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.inner
            .write()
            .await
            .clusters
            .insert(cluster.id, cluster.clone());
        Ok(())
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.put_cluster(cluster).await
    }

    async fn delete_cluster(&self, id: Uuid) -> Result<()> {
        self.inner.write().await.clusters.remove(&id);
        Ok(())
    }

    async fn find_cluster_containing(&self, article_id: Uuid) -> Result<Option<Cluster>> {
        Ok(self
            .inner
            .read()
            .await
            .clusters
            .values()
            .find(|c| c.article_ids.contains(&article_id))
            .cloned())
    }

    async fn list_clusters_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Cluster>> {
        Ok(self
            .inner
            .read()
            .await
            .clusters
            .values()
            .filter(|c| c.updated_at >= since)
            .cloned()
            .collect())
    }

    async fn put_embedding(&self, embedding: &StoredEmbedding) -> Result<()> {
        self.inner
            .write()
            .await
            .embeddings
            .insert(embedding.article_id, embedding.clone());
        Ok(())
    }

    async fn find_embedding_by_article(
        &self,
        article_id: Uuid,
    ) -> Result<Option<StoredEmbedding>> {
        Ok(self.inner.read().await.embeddings.get(&article_id).cloned())
    }

    async fn put_alert(&self, alert: &Alert) -> Result<()> {
        self.inner.write().await.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn find_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(self.inner.read().await.alerts.get(&id).cloned())
    }

    async fn update_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        sent_at: Option<DateTime<Utc>>,
        results: &[ChannelResult],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let alert = inner
            .alerts
            .get_mut(&id)
            .ok_or_else(|| NewswireError::Store(format!("no alert {id}")))?;
        alert.status = status;
        alert.sent_at = sent_at;
        alert.results = results.to_vec();
        Ok(())
    }

    async fn increment_alert_resend(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let alert = inner
            .alerts
            .get_mut(&id)
            .ok_or_else(|| NewswireError::Store(format!("no alert {id}")))?;
        alert.resend_count += 1;
        Ok(())
    }

    async fn list_recent_alerts(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .inner
            .read()
            .await
            .alerts
            .values()
            .filter(|a| a.created_at >= since)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn count_alerts_since(&self, since: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .await
            .alerts
            .values()
            .filter(|a| a.created_at >= since)
            .count())
    }

    async fn list_pending_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self
            .inner
            .read()
            .await
            .alerts
            .values()
            .filter(|a| a.status == AlertStatus::Pending)
            .cloned()
            .collect())
    }

    async fn upsert_feed(&self, feed: &Feed) -> Result<()> {
        self.inner
            .write()
            .await
            .feeds
            .insert(feed.id.clone(), feed.clone());
        Ok(())
    }

    async fn get_feed(&self, id: &str) -> Result<Option<Feed>> {
        Ok(self.inner.read().await.feeds.get(id).cloned())
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        Ok(self.inner.read().await.feeds.values().cloned().collect())
    }

    async fn record_feed_success(
        &self,
        id: &str,
        articles_processed: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(feed) = inner.feeds.get_mut(id) {
            feed.last_fetched_at = Some(at);
            feed.articles_processed += articles_processed;
        }
        Ok(())
    }

    async fn record_feed_error(&self, id: &str, error: &str, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(feed) = inner.feeds.get_mut(id) {
            feed.error_count += 1;
            feed.last_error = Some(error.to_string());
            feed.last_error_at = Some(at);
        }
        Ok(())
    }

    async fn put_metric(&self, metric: &Metric) -> Result<()> {
        self.inner.write().await.metrics.push(metric.clone());
        Ok(())
    }

    async fn compact(&self, now: DateTime<Utc>) -> Result<CompactionStats> {
        let mut inner = self.inner.write().await;
        let mut stats = CompactionStats::default();

        let article_cutoff = now - Duration::days(ARTICLE_RETENTION_DAYS);
        let expired: Vec<Uuid> = inner
            .articles
            .values()
            .filter(|a| a.fetched_at < article_cutoff)
            .map(|a| a.id)
            .collect();
        for id in expired {
            if let Some(article) = inner.articles.remove(&id) {
                inner.url_index.remove(&article.url);
                stats.articles_removed += 1;
            }
        }

        let cluster_cutoff = now - Duration::days(CLUSTER_INACTIVITY_DAYS);
        let stale: Vec<Uuid> = inner
            .clusters
            .values()
            .filter(|c| c.updated_at < cluster_cutoff)
            .map(|c| c.id)
            .collect();
        for id in stale {
            inner.clusters.remove(&id);
            stats.clusters_removed += 1;
        }

        let embedding_cutoff = now - Duration::days(EMBEDDING_TTL_DAYS);
        let expired: Vec<Uuid> = inner
            .embeddings
            .values()
            .filter(|e| e.created_at < embedding_cutoff)
            .map(|e| e.article_id)
            .collect();
        for id in expired {
            inner.embeddings.remove(&id);
            stats.embeddings_removed += 1;
        }

        let alert_cutoff = now - Duration::days(ALERT_RETENTION_DAYS);
        let expired: Vec<Uuid> = inner
            .alerts
            .values()
            .filter(|a| a.created_at < alert_cutoff)
            .map(|a| a.id)
            .collect();
        for id in expired {
            inner.alerts.remove(&id);
            stats.alerts_removed += 1;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newswire_common::Priority;

    fn article(url: &str, hash: &str) -> Article {
        Article {
            id: Uuid::new_v4(),
            url: url.to_string(),
            title: "Title".to_string(),
            summary: "Summary".to_string(),
            content: None,
            source: "wire".to_string(),
            source_id: "wire-1".to_string(),
            category: "business".to_string(),
            tags: vec!["markets".to_string()],
            priority: Priority::Medium,
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            author: None,
            image_url: None,
            language: None,
            entities: vec![],
            content_hash: hash.to_string(),
            duplicate_checked: false,
            is_duplicate: false,
            original_article_id: None,
            processed_at: None,
            alert_sent: false,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_url() {
        let store = MemoryStore::new();
        let a = article("https://example.com/a", "h1");
        store.put_article(&a).await.unwrap();
        let mut b = article("https://example.com/a", "h2");
        b.id = Uuid::new_v4();
        assert!(store.put_article(&b).await.is_err());
    }

    #[tokio::test]
    async fn candidate_query_window_is_inclusive() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut old = article("https://example.com/old", "h1");
        old.published_at = now - Duration::hours(24);
        store.put_article(&old).await.unwrap();

        let probe = article("https://example.com/new", "h2");
        let query = CandidateQuery {
            exclude_id: probe.id,
            window_start: now - Duration::hours(24),
            source: "wire".to_string(),
            category: "business".to_string(),
            tags: vec![],
            limit: 50,
        };
        let candidates = store.find_candidate_articles(&query).await.unwrap();
        assert_eq!(candidates.len(), 1, "boundary candidate should be included");
    }

    #[tokio::test]
    async fn candidate_query_requires_shared_facet() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut other = article("https://example.com/other", "h1");
        other.source = "elsewhere".to_string();
        other.category = "sports".to_string();
        other.tags = vec!["football".to_string()];
        store.put_article(&other).await.unwrap();

        let probe = article("https://example.com/probe", "h2");
        let query = CandidateQuery {
            exclude_id: probe.id,
            window_start: now - Duration::hours(24),
            source: "wire".to_string(),
            category: "business".to_string(),
            tags: vec!["markets".to_string()],
            limit: 50,
        };
        assert!(store
            .find_candidate_articles(&query)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn duplicate_link_pair_is_unique() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let link = DuplicateLink {
            original_article_id: a,
            duplicate_article_id: b,
            similarity_score: 1.0,
            detection_method: newswire_common::DetectionMethod::ContentHash,
            breakdown: Default::default(),
            original_title: String::new(),
            duplicate_title: String::new(),
            original_source: String::new(),
            duplicate_source: String::new(),
            time_delta_hours: 0.25,
            created_at: Utc::now(),
        };
        store.put_duplicate_link(&link).await.unwrap();
        store.put_duplicate_link(&link).await.unwrap();
        assert_eq!(store.all_links().await.len(), 1);
    }

    #[tokio::test]
    async fn self_link_rejected() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let link = DuplicateLink {
            original_article_id: a,
            duplicate_article_id: a,
            similarity_score: 1.0,
            detection_method: newswire_common::DetectionMethod::ContentHash,
            breakdown: Default::default(),
            original_title: String::new(),
            duplicate_title: String::new(),
            original_source: String::new(),
            duplicate_source: String::new(),
            time_delta_hours: 0.0,
            created_at: Utc::now(),
        };
        assert!(store.put_duplicate_link(&link).await.is_err());
    }

    #[tokio::test]
    async fn compaction_enforces_retention() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut ancient = article("https://example.com/ancient", "h1");
        ancient.fetched_at = now - Duration::days(91);
        store.put_article(&ancient).await.unwrap();
        let fresh = article("https://example.com/fresh", "h2");
        store.put_article(&fresh).await.unwrap();

        let stats = store.compact(now).await.unwrap();
        assert_eq!(stats.articles_removed, 1);
        assert!(store
            .find_article_by_url("https://example.com/ancient")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_article_by_url("https://example.com/fresh")
            .await
            .unwrap()
            .is_some());
    }
}
