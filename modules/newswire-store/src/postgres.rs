//! Postgres implementation of the store contract.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use newswire_common::{
    Alert, AlertStatus, Article, ChannelKind, ChannelResult, Cluster, ClusterCentroid,
    DuplicateLink, Entity, Feed, Metric, NewswireError, Priority, Result, SimilarityBreakdown,
    StoredEmbedding,
};

use crate::store::{
    ArticleFlags, CandidateQuery, CompactionStats, Store, ALERT_RETENTION_DAYS,
    ARTICLE_RETENTION_DAYS, CLUSTER_INACTIVITY_DAYS, EMBEDDING_TTL_DAYS,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| NewswireError::Store(e.to_string()))?;
        Ok(())
    }
}

fn store_err(e: sqlx::Error) -> NewswireError {
    NewswireError::Store(e.to_string())
}

// --- Row mapping ---

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    url: String,
    title: String,
    summary: String,
    content: Option<String>,
    source: String,
    source_id: String,
    category: String,
    tags: Vec<String>,
    priority: String,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
    author: Option<String>,
    image_url: Option<String>,
    language: Option<String>,
    entities: serde_json::Value,
    content_hash: String,
    duplicate_checked: bool,
    is_duplicate: bool,
    original_article_id: Option<Uuid>,
    processed_at: Option<DateTime<Utc>>,
    alert_sent: bool,
}

impl ArticleRow {
    fn into_article(self) -> Result<Article> {
        let entities: Vec<Entity> =
            serde_json::from_value(self.entities).map_err(|e| NewswireError::Store(e.to_string()))?;
        let priority: Priority = self.priority.parse().map_err(NewswireError::Store)?;
        Ok(Article {
            id: self.id,
            url: self.url,
            title: self.title,
            summary: self.summary,
            content: self.content,
            source: self.source,
            source_id: self.source_id,
            category: self.category,
            tags: self.tags,
            priority,
            published_at: self.published_at,
            fetched_at: self.fetched_at,
            author: self.author,
            image_url: self.image_url,
            language: self.language,
            entities,
            content_hash: self.content_hash,
            duplicate_checked: self.duplicate_checked,
            is_duplicate: self.is_duplicate,
            original_article_id: self.original_article_id,
            processed_at: self.processed_at,
            alert_sent: self.alert_sent,
        })
    }
}

fn rows_to_articles(rows: Vec<ArticleRow>) -> Result<Vec<Article>> {
    rows.into_iter().map(ArticleRow::into_article).collect()
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    original_article_id: Uuid,
    duplicate_article_id: Uuid,
    similarity_score: f64,
    detection_method: String,
    breakdown: serde_json::Value,
    original_title: String,
    duplicate_title: String,
    original_source: String,
    duplicate_source: String,
    time_delta_hours: f64,
    created_at: DateTime<Utc>,
}

impl LinkRow {
    fn into_link(self) -> Result<DuplicateLink> {
        let detection_method =
            serde_json::from_value(serde_json::Value::String(self.detection_method))
                .map_err(|e| NewswireError::Store(e.to_string()))?;
        let breakdown: SimilarityBreakdown = serde_json::from_value(self.breakdown)
            .map_err(|e| NewswireError::Store(e.to_string()))?;
        Ok(DuplicateLink {
            original_article_id: self.original_article_id,
            duplicate_article_id: self.duplicate_article_id,
            similarity_score: self.similarity_score,
            detection_method,
            breakdown,
            original_title: self.original_title,
            duplicate_title: self.duplicate_title,
            original_source: self.original_source,
            duplicate_source: self.duplicate_source,
            time_delta_hours: self.time_delta_hours,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClusterRow {
    id: Uuid,
    article_ids: Vec<Uuid>,
    centroid: serde_json::Value,
    category: String,
    tags: Vec<String>,
    sources: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClusterRow {
    fn into_cluster(self) -> Result<Cluster> {
        let centroid: ClusterCentroid = serde_json::from_value(self.centroid)
            .map_err(|e| NewswireError::Store(e.to_string()))?;
        Ok(Cluster {
            id: self.id,
            article_ids: self.article_ids,
            centroid,
            category: self.category,
            tags: self.tags,
            sources: self.sources,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    article_id: Uuid,
    title: String,
    summary: String,
    source: String,
    category: String,
    priority: String,
    url: String,
    published_at: DateTime<Utc>,
    entities: serde_json::Value,
    tags: Vec<String>,
    channels: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    results: serde_json::Value,
    resend_count: i32,
}

impl AlertRow {
    fn into_alert(self) -> Result<Alert> {
        let entities: Vec<Entity> =
            serde_json::from_value(self.entities).map_err(|e| NewswireError::Store(e.to_string()))?;
        let results: Vec<ChannelResult> =
            serde_json::from_value(self.results).map_err(|e| NewswireError::Store(e.to_string()))?;
        let channels: Vec<ChannelKind> = self
            .channels
            .into_iter()
            .map(|c| {
                serde_json::from_value(serde_json::Value::String(c))
                    .map_err(|e| NewswireError::Store(e.to_string()))
            })
            .collect::<Result<_>>()?;
        let status: AlertStatus = serde_json::from_value(serde_json::Value::String(self.status))
            .map_err(|e| NewswireError::Store(e.to_string()))?;
        let priority: Priority = self.priority.parse().map_err(NewswireError::Store)?;
        Ok(Alert {
            id: self.id,
            article_id: self.article_id,
            title: self.title,
            summary: self.summary,
            source: self.source,
            category: self.category,
            priority,
            url: self.url,
            published_at: self.published_at,
            entities,
            tags: self.tags,
            channels,
            status,
            created_at: self.created_at,
            sent_at: self.sent_at,
            results,
            resend_count: self.resend_count as u32,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    category: String,
    priority: String,
    enabled: bool,
    tags: Vec<String>,
    last_fetched_at: Option<DateTime<Utc>>,
    articles_processed: i64,
    error_count: i32,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

impl FeedRow {
    fn into_feed(self) -> Result<Feed> {
        let priority: Priority = self.priority.parse().map_err(NewswireError::Store)?;
        Ok(Feed {
            id: self.id,
            name: self.name,
            url: self.url,
            category: self.category,
            priority,
            enabled: self.enabled,
            tags: self.tags,
            last_fetched_at: self.last_fetched_at,
            articles_processed: self.articles_processed as u64,
            error_count: self.error_count as u32,
            last_error: self.last_error,
            last_error_at: self.last_error_at,
        })
    }
}

fn json(value: &impl serde::Serialize) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| NewswireError::Store(e.to_string()))
}

#[async_trait]
impl Store for PgStore {
    async fn put_article(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
                (id, url, title, summary, content, source, source_id, category,
                 tags, priority, published_at, fetched_at, author, image_url,
                 language, entities, content_hash, duplicate_checked,
                 is_duplicate, original_article_id, processed_at, alert_sent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(article.id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.content)
        .bind(&article.source)
        .bind(&article.source_id)
        .bind(&article.category)
        .bind(&article.tags)
        .bind(article.priority.to_string())
        .bind(article.published_at)
        .bind(article.fetched_at)
        .bind(&article.author)
        .bind(&article.image_url)
        .bind(&article.language)
        .bind(json(&article.entities)?)
        .bind(&article.content_hash)
        .bind(article.duplicate_checked)
        .bind(article.is_duplicate)
        .bind(article.original_article_id)
        .bind(article.processed_at)
        .bind(article.alert_sent)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_article(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(ArticleRow::into_article).transpose()
    }

    async fn find_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>("SELECT * FROM articles WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(ArticleRow::into_article).transpose()
    }

    async fn find_article_by_hash(&self, hash: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE content_hash = $1 ORDER BY fetched_at ASC LIMIT 1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(ArticleRow::into_article).transpose()
    }

    async fn find_candidate_articles(&self, query: &CandidateQuery) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE id <> $1
              AND published_at >= $2
              AND (source = $3 OR category = $4 OR tags && $5)
            ORDER BY published_at DESC
            LIMIT $6
            "#,
        )
        .bind(query.exclude_id)
        .bind(query.window_start)
        .bind(&query.source)
        .bind(&query.category)
        .bind(&query.tags)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows_to_articles(rows)
    }

    async fn list_unchecked_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT * FROM articles WHERE NOT duplicate_checked ORDER BY fetched_at ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows_to_articles(rows)
    }

    async fn update_article_flags(&self, flags: &ArticleFlags) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE articles
            SET duplicate_checked = $2, is_duplicate = $3,
                original_article_id = $4, processed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(flags.article_id)
        .bind(flags.duplicate_checked)
        .bind(flags.is_duplicate)
        .bind(flags.original_article_id)
        .bind(flags.processed_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn mark_alert_sent(&self, article_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE articles SET alert_sent = TRUE WHERE id = $1")
            .bind(article_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn search_articles(&self, query: &str, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT * FROM articles
            WHERE to_tsvector('english', title || ' ' || summary || ' ' || coalesce(content, ''))
                  @@ plainto_tsquery('english', $1)
               OR entities::text ILIKE '%' || $1 || '%'
            ORDER BY published_at DESC
            LIMIT $2
            "#,
        )
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows_to_articles(rows)
    }

    async fn put_duplicate_link(&self, link: &DuplicateLink) -> Result<()> {
        if link.original_article_id == link.duplicate_article_id {
            return Err(NewswireError::Store(
                "duplicate link must not be self-referential".to_string(),
            ));
        }
        sqlx::query(
            r#"
            INSERT INTO duplicate_links
                (original_article_id, duplicate_article_id, similarity_score,
                 detection_method, breakdown, original_title, duplicate_title,
                 original_source, duplicate_source, time_delta_hours, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (original_article_id, duplicate_article_id) DO NOTHING
            "#,
        )
        .bind(link.original_article_id)
        .bind(link.duplicate_article_id)
        .bind(link.similarity_score)
        .bind(link.detection_method.to_string())
        .bind(json(&link.breakdown)?)
        .bind(&link.original_title)
        .bind(&link.duplicate_title)
        .bind(&link.original_source)
        .bind(&link.duplicate_source)
        .bind(link.time_delta_hours)
        .bind(link.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn list_duplicate_links_for(&self, original_id: Uuid) -> Result<Vec<DuplicateLink>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            "SELECT * FROM duplicate_links WHERE original_article_id = $1 ORDER BY created_at",
        )
        .bind(original_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(LinkRow::into_link).collect()
    }

    async fn put_cluster(&self, cluster: &Cluster) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clusters
                (id, article_ids, centroid, category, tags, sources, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET article_ids = EXCLUDED.article_ids, centroid = EXCLUDED.centroid,
                tags = EXCLUDED.tags, sources = EXCLUDED.sources,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cluster.id)
        .bind(&cluster.article_ids)
        .bind(json(&cluster.centroid)?)
        .bind(&cluster.category)
        .bind(&cluster.tags)
        .bind(&cluster.sources)
        .bind(cluster.created_at)
        .bind(cluster.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn update_cluster(&self, cluster: &Cluster) -> Result<()> {
        self.put_cluster(cluster).await
    }

    async fn delete_cluster(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM clusters WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn find_cluster_containing(&self, article_id: Uuid) -> Result<Option<Cluster>> {
        let row = sqlx::query_as::<_, ClusterRow>(
            "SELECT * FROM clusters WHERE article_ids @> ARRAY[$1]::uuid[] LIMIT 1",
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(ClusterRow::into_cluster).transpose()
    }

    async fn list_clusters_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Cluster>> {
        let rows = sqlx::query_as::<_, ClusterRow>(
            "SELECT * FROM clusters WHERE updated_at >= $1 ORDER BY updated_at DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(ClusterRow::into_cluster).collect()
    }

    async fn put_embedding(&self, embedding: &StoredEmbedding) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO embeddings (article_id, vector, model, text_length, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (article_id) DO UPDATE
            SET vector = EXCLUDED.vector, model = EXCLUDED.model,
                text_length = EXCLUDED.text_length, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(embedding.article_id)
        .bind(&embedding.vector)
        .bind(&embedding.model)
        .bind(embedding.text_length as i32)
        .bind(embedding.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_embedding_by_article(
        &self,
        article_id: Uuid,
    ) -> Result<Option<StoredEmbedding>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            article_id: Uuid,
            vector: Vec<f32>,
            model: String,
            text_length: i32,
            created_at: DateTime<Utc>,
        }
        let row = sqlx::query_as::<_, Row>("SELECT * FROM embeddings WHERE article_id = $1")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(|r| StoredEmbedding {
            article_id: r.article_id,
            vector: r.vector,
            model: r.model,
            text_length: r.text_length as usize,
            created_at: r.created_at,
        }))
    }

    async fn put_alert(&self, alert: &Alert) -> Result<()> {
        let channels: Vec<String> = alert.channels.iter().map(|c| c.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO alerts
                (id, article_id, title, summary, source, category, priority, url,
                 published_at, entities, tags, channels, status, created_at,
                 sent_at, results, resend_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17)
            "#,
        )
        .bind(alert.id)
        .bind(alert.article_id)
        .bind(&alert.title)
        .bind(&alert.summary)
        .bind(&alert.source)
        .bind(&alert.category)
        .bind(alert.priority.to_string())
        .bind(&alert.url)
        .bind(alert.published_at)
        .bind(json(&alert.entities)?)
        .bind(&alert.tags)
        .bind(&channels)
        .bind(alert.status.to_string())
        .bind(alert.created_at)
        .bind(alert.sent_at)
        .bind(json(&alert.results)?)
        .bind(alert.resend_count as i32)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query_as::<_, AlertRow>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(AlertRow::into_alert).transpose()
    }

    async fn update_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        sent_at: Option<DateTime<Utc>>,
        results: &[ChannelResult],
    ) -> Result<()> {
        sqlx::query("UPDATE alerts SET status = $2, sent_at = $3, results = $4 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .bind(sent_at)
            .bind(json(&results.to_vec())?)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn increment_alert_resend(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE alerts SET resend_count = resend_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn list_recent_alerts(&self, since: DateTime<Utc>) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE created_at >= $1 ORDER BY created_at DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(AlertRow::into_alert).collect()
    }

    async fn count_alerts_since(&self, since: DateTime<Utc>) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE created_at >= $1")
                .bind(since)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn list_pending_alerts(&self) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT * FROM alerts WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(AlertRow::into_alert).collect()
    }

    async fn upsert_feed(&self, feed: &Feed) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feeds
                (id, name, url, category, priority, enabled, tags,
                 last_fetched_at, articles_processed, error_count, last_error,
                 last_error_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, url = EXCLUDED.url,
                category = EXCLUDED.category, priority = EXCLUDED.priority,
                enabled = EXCLUDED.enabled, tags = EXCLUDED.tags
            "#,
        )
        .bind(&feed.id)
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.category)
        .bind(feed.priority.to_string())
        .bind(feed.enabled)
        .bind(&feed.tags)
        .bind(feed.last_fetched_at)
        .bind(feed.articles_processed as i64)
        .bind(feed.error_count as i32)
        .bind(&feed.last_error)
        .bind(feed.last_error_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_feed(&self, id: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>("SELECT * FROM feeds WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(FeedRow::into_feed).transpose()
    }

    async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>("SELECT * FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.into_iter().map(FeedRow::into_feed).collect()
    }

    async fn record_feed_success(
        &self,
        id: &str,
        articles_processed: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = $2, articles_processed = articles_processed + $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(articles_processed as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn record_feed_error(&self, id: &str, error: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET error_count = error_count + 1, last_error = $2, last_error_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn put_metric(&self, metric: &Metric) -> Result<()> {
        // A failed metric write shouldn't abort the cycle that produced it.
        let result = sqlx::query(
            "INSERT INTO metrics (name, value, labels, recorded_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&metric.name)
        .bind(metric.value)
        .bind(json(&metric.labels)?)
        .bind(metric.recorded_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(name = %metric.name, error = %e, "Failed to record metric");
        }
        Ok(())
    }

    async fn compact(&self, now: DateTime<Utc>) -> Result<CompactionStats> {
        let mut stats = CompactionStats::default();

        let articles = sqlx::query("DELETE FROM articles WHERE fetched_at < $1")
            .bind(now - Duration::days(ARTICLE_RETENTION_DAYS))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        stats.articles_removed = articles.rows_affected();

        let clusters = sqlx::query("DELETE FROM clusters WHERE updated_at < $1")
            .bind(now - Duration::days(CLUSTER_INACTIVITY_DAYS))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        stats.clusters_removed = clusters.rows_affected();

        let embeddings = sqlx::query("DELETE FROM embeddings WHERE created_at < $1")
            .bind(now - Duration::days(EMBEDDING_TTL_DAYS))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        stats.embeddings_removed = embeddings.rows_affected();

        let alerts = sqlx::query("DELETE FROM alerts WHERE created_at < $1")
            .bind(now - Duration::days(ALERT_RETENTION_DAYS))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        stats.alerts_removed = alerts.rows_affected();

        Ok(stats)
    }
}
