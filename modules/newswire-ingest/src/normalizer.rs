//! Article normalization and exact-duplicate short-circuit.
//!
//! For every raw item: clean text, resolve the publish time, fingerprint
//! the normalized content, and short-circuit on URL or fingerprint hits
//! before the article ever reaches the similarity engine. An article is
//! written to the store before its event is enqueued, so downstream
//! queries always see it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use newswire_common::events::ArticleStored;
use newswire_common::text::{clean_text, content_fingerprint, FingerprintAlgo};
use newswire_common::{
    Article, DetectionMethod, DuplicateLink, Feed, Result, SimilarityBreakdown,
};
use newswire_store::{ArticleFlags, Store};

use crate::entities::EntityExtractor;
use crate::fetcher::RawItem;

/// What happened to one raw item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeOutcome {
    /// Persisted and handed to the dedup engine.
    Stored,
    /// URL already known; complete no-op.
    KnownUrl,
    /// Byte-equivalent content already known; persisted as an exact
    /// duplicate with a content-hash link, not forwarded.
    ExactDuplicate,
}

pub struct Normalizer {
    store: Arc<dyn Store>,
    extractor: EntityExtractor,
    fingerprint_algo: FingerprintAlgo,
    dedup_tx: mpsc::Sender<ArticleStored>,
}

impl Normalizer {
    pub fn new(
        store: Arc<dyn Store>,
        fingerprint_algo: FingerprintAlgo,
        dedup_tx: mpsc::Sender<ArticleStored>,
    ) -> Self {
        Self {
            store,
            extractor: EntityExtractor::new(),
            fingerprint_algo,
            dedup_tx,
        }
    }

    /// Normalize and persist one item. `page_content` is the optional
    /// full-page extraction result.
    pub async fn process_item(
        &self,
        feed: &Feed,
        item: &RawItem,
        page_content: Option<String>,
        fetched_at: DateTime<Utc>,
    ) -> Result<NormalizeOutcome> {
        let title = clean_text(&item.title);
        let summary = clean_text(&item.summary);
        let content = page_content
            .or_else(|| item.content.clone())
            .map(|c| clean_text(&c))
            .filter(|c| !c.is_empty());

        // Feed timestamps are unreliable; fall back to fetch time
        let published_at = item.published.unwrap_or(fetched_at);

        let hash_body = content.as_deref().unwrap_or(&summary);
        let content_hash = content_fingerprint(&title, hash_body, self.fingerprint_algo);

        // Exact-duplicate short-circuit, URL first
        if self.store.find_article_by_url(&item.link).await?.is_some() {
            debug!(url = %item.link, "Known URL, skipping");
            return Ok(NormalizeOutcome::KnownUrl);
        }

        let entity_text = format!("{title} {}", content.as_deref().unwrap_or(&summary));
        let entities = self.extractor.extract(&entity_text);

        let mut article = Article {
            id: Uuid::new_v4(),
            url: item.link.clone(),
            title,
            summary,
            content,
            source: feed.name.clone(),
            source_id: item.guid.clone().unwrap_or_else(|| feed.id.clone()),
            category: pick_category(feed, item),
            tags: feed.tags.clone(),
            priority: feed.priority,
            published_at,
            fetched_at,
            author: item.author.clone(),
            image_url: item.image_url.clone(),
            language: None,
            entities,
            content_hash,
            duplicate_checked: false,
            is_duplicate: false,
            original_article_id: None,
            processed_at: None,
            alert_sent: false,
        };

        if let Some(existing) = self
            .store
            .find_article_by_hash(&article.content_hash)
            .await?
        {
            return self.store_exact_duplicate(&mut article, &existing, fetched_at).await;
        }

        self.store.put_article(&article).await?;
        debug!(article_id = %article.id, source = %article.source, "Article stored");

        if self
            .dedup_tx
            .send(ArticleStored::new(article.id))
            .await
            .is_err()
        {
            warn!("Dedup queue closed, article will be reprocessed from the store");
        }
        Ok(NormalizeOutcome::Stored)
    }

    /// Identical normalized content from a different URL: persist the
    /// article already flagged, link it to the found original, and keep it
    /// away from the engine and the dispatcher.
    async fn store_exact_duplicate(
        &self,
        article: &mut Article,
        existing: &Article,
        now: DateTime<Utc>,
    ) -> Result<NormalizeOutcome> {
        article.duplicate_checked = true;
        article.is_duplicate = true;
        article.original_article_id = Some(existing.id);
        article.processed_at = Some(now);

        self.store.put_article(article).await?;

        let delta_hours =
            (article.published_at - existing.published_at).num_minutes() as f64 / 60.0;
        self.store
            .put_duplicate_link(&DuplicateLink {
                original_article_id: existing.id,
                duplicate_article_id: article.id,
                similarity_score: 1.0,
                detection_method: DetectionMethod::ContentHash,
                breakdown: SimilarityBreakdown {
                    content_hash: 1.0,
                    overall: 1.0,
                    ..Default::default()
                },
                original_title: existing.title.clone(),
                duplicate_title: article.title.clone(),
                original_source: existing.source.clone(),
                duplicate_source: article.source.clone(),
                time_delta_hours: delta_hours,
                created_at: now,
            })
            .await?;

        // Flags were written at insert, but route through the one update
        // path so the store-side processed timestamp matches
        self.store
            .update_article_flags(&ArticleFlags {
                article_id: article.id,
                duplicate_checked: true,
                is_duplicate: true,
                original_article_id: Some(existing.id),
                processed_at: now,
            })
            .await?;

        info!(
            article_id = %article.id,
            original_id = %existing.id,
            "Exact duplicate by content hash"
        );
        Ok(NormalizeOutcome::ExactDuplicate)
    }
}

/// Item categories win over the feed default when present.
fn pick_category(feed: &Feed, item: &RawItem) -> String {
    item.categories
        .first()
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| feed.category.clone())
}
