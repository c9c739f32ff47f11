//! The deduplication engine: candidate retrieval, multi-signal scoring,
//! original election, and cluster update for every ingested article.
//!
//! The engine drains its queue in batches and is single-active: one batch
//! at a time, articles within a batch processed sequentially, bounding
//! memory and store load. Recoverable failures re-enqueue the article with
//! an attempt counter; after three attempts it stays `duplicate_checked =
//! false` for later reprocessing.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use newswire_ai::{cosine_similarity, ComparisonDoc, DuplicateValidator, TextEmbedder};
use newswire_common::events::{ArticleStored, UniqueArticleDetected};
use newswire_common::{
    Article, DetectionMethod, DuplicateLink, Metric, Result, SimilarityBreakdown, StoredEmbedding,
};
use newswire_store::{ArticleFlags, CandidateQuery, Store};

use crate::cluster;
use crate::score::{self, PairDecision, SignalWeights, CHEAP_DISCARD_FLOOR};
use crate::signals;
use crate::tfidf::{self, TfIdfConfig};

const MAX_ATTEMPTS: u32 = 3;
const LLM_CONFIRM_CONFIDENCE: f64 = 0.85;
const EMBED_SNIPPET_CHARS: usize = 500;
const VALIDATION_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub time_window_hours: i64,
    pub weights: SignalWeights,
    pub batch_size: usize,
    pub max_candidates: usize,
    pub tfidf: TfIdfConfig,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            time_window_hours: 24,
            weights: SignalWeights::default(),
            batch_size: 50,
            max_candidates: 50,
            tfidf: TfIdfConfig::default(),
        }
    }
}

struct ScoredCandidate {
    candidate: Article,
    breakdown: SimilarityBreakdown,
}

struct MatchedCandidate {
    candidate: Article,
    breakdown: SimilarityBreakdown,
    method: DetectionMethod,
}

pub struct DedupEngine {
    store: Arc<dyn Store>,
    embedder: Arc<dyn TextEmbedder>,
    validator: Option<Arc<dyn DuplicateValidator>>,
    config: DedupConfig,
    alerts_tx: mpsc::Sender<UniqueArticleDetected>,
}

impl DedupEngine {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn TextEmbedder>,
        validator: Option<Arc<dyn DuplicateValidator>>,
        config: DedupConfig,
        alerts_tx: mpsc::Sender<UniqueArticleDetected>,
    ) -> Self {
        Self {
            store,
            embedder,
            validator,
            config,
            alerts_tx,
        }
    }

    /// Drain the queue until the upstream sender closes. Re-enqueued retries
    /// ride along with the next batch.
    pub async fn run(&self, mut rx: mpsc::Receiver<ArticleStored>) {
        let mut retries: Vec<ArticleStored> = Vec::new();
        let mut buffer: Vec<ArticleStored> = Vec::with_capacity(self.config.batch_size);

        loop {
            buffer.clear();
            buffer.append(&mut retries);

            if buffer.len() < self.config.batch_size {
                let wanted = self.config.batch_size - buffer.len();
                let received = rx.recv_many(&mut buffer, wanted).await;
                if received == 0 && buffer.is_empty() {
                    break;
                }
            }

            debug!(batch = buffer.len(), "Dedup batch start");
            for job in buffer.drain(..) {
                match self.process(&job).await {
                    Ok(()) => {}
                    Err(e) if e.is_recoverable() && job.attempt + 1 < MAX_ATTEMPTS => {
                        warn!(
                            article_id = %job.article_id,
                            attempt = job.attempt,
                            error = %e,
                            "Recoverable dedup failure, re-enqueueing"
                        );
                        retries.push(job.retry());
                    }
                    Err(e) => {
                        warn!(
                            article_id = %job.article_id,
                            attempts = job.attempt + 1,
                            error = %e,
                            "Dedup failed, leaving article unchecked"
                        );
                        let metric = Metric::counter("dedup_articles_failed", 1.0, Utc::now())
                            .with_label("article_id", &job.article_id.to_string());
                        let _ = self.store.put_metric(&metric).await;
                    }
                }
            }
        }
        info!("Dedup engine drained, shutting down");
    }

    /// Score one article against its candidate window and persist the
    /// verdict. Every store write for the article happens before returning.
    pub async fn process(&self, job: &ArticleStored) -> Result<()> {
        let article = match self.store.find_article(job.article_id).await? {
            Some(a) => a,
            None => {
                warn!(article_id = %job.article_id, "Dedup job for unknown article");
                return Ok(());
            }
        };
        if article.duplicate_checked {
            return Ok(());
        }

        let now = Utc::now();
        let window_start = now - Duration::hours(self.config.time_window_hours);
        let candidates = self
            .store
            .find_candidate_articles(&CandidateQuery {
                exclude_id: article.id,
                window_start,
                source: article.source.clone(),
                category: article.category.clone(),
                tags: article.tags.clone(),
                limit: self.config.max_candidates,
            })
            .await?;

        if candidates.is_empty() {
            return self.finish_unique(&article, now).await;
        }

        let embedding = self.embedding_for(&article).await?;

        let mut scored: Vec<ScoredCandidate> = Vec::new();
        for candidate in candidates {
            let breakdown = self.score_pair(&article, &candidate, &embedding).await?;
            if breakdown.overall < CHEAP_DISCARD_FLOOR {
                continue;
            }
            scored.push(ScoredCandidate {
                candidate,
                breakdown,
            });
        }
        scored.sort_by(|a, b| {
            b.breakdown
                .overall
                .partial_cmp(&a.breakdown.overall)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut matched: Vec<MatchedCandidate> = Vec::new();
        for sc in scored {
            let decision = score::decide(&sc.breakdown, self.config.similarity_threshold);
            if self.confirm_match(&article, &sc, &decision).await {
                matched.push(MatchedCandidate {
                    candidate: sc.candidate,
                    breakdown: sc.breakdown,
                    method: decision.method,
                });
            }
        }

        if matched.is_empty() {
            self.finish_unique(&article, now).await
        } else {
            self.finish_matched(&article, matched, now).await
        }
    }

    /// Threshold comparison, gated by the LLM validator inside the
    /// borderline band. Validator failure downgrades to the algorithmic
    /// decision.
    async fn confirm_match(
        &self,
        article: &Article,
        sc: &ScoredCandidate,
        decision: &PairDecision,
    ) -> bool {
        if !decision.borderline {
            return decision.algorithmic_match;
        }
        let Some(validator) = &self.validator else {
            return decision.algorithmic_match;
        };

        let a = comparison_doc(article);
        let b = comparison_doc(&sc.candidate);
        match validator.validate_duplicate(&a, &b).await {
            Some(verdict) => {
                debug!(
                    overall = sc.breakdown.overall,
                    llm_duplicate = verdict.is_duplicate,
                    llm_confidence = verdict.confidence,
                    "Borderline pair validated"
                );
                verdict.is_duplicate && verdict.confidence >= LLM_CONFIRM_CONFIDENCE
            }
            None => decision.algorithmic_match,
        }
    }

    /// All seven signals for one pair. Hash equality short-circuits.
    async fn score_pair(
        &self,
        article: &Article,
        candidate: &Article,
        article_embedding: &[f32],
    ) -> Result<SimilarityBreakdown> {
        if !article.content_hash.is_empty() && article.content_hash == candidate.content_hash {
            return Ok(score::combine(
                SimilarityBreakdown {
                    content_hash: 1.0,
                    ..Default::default()
                },
                self.config.weights,
            ));
        }

        let candidate_embedding = self.embedding_for(candidate).await?;

        let breakdown = SimilarityBreakdown {
            content_hash: 0.0,
            title: signals::title_similarity(&article.title, &candidate.title),
            content: tfidf::pairwise_cosine(
                &article.comparable_text(),
                &candidate.comparable_text(),
                &self.config.tfidf,
            ),
            entity: signals::entity_similarity(article, candidate),
            semantic: cosine_similarity(article_embedding, &candidate_embedding),
            temporal: signals::temporal_proximity(article.published_at, candidate.published_at),
            source_alignment: signals::source_alignment(article, candidate),
            overall: 0.0,
        };
        Ok(score::combine(breakdown, self.config.weights))
    }

    /// Cached-or-fresh embedding for an article, persisted on first
    /// computation.
    async fn embedding_for(&self, article: &Article) -> Result<Vec<f32>> {
        if let Some(stored) = self.store.find_embedding_by_article(article.id).await? {
            return Ok(stored.vector);
        }

        let text = embed_text(article);
        let vector = self.embedder.embed(&text).await;
        self.store
            .put_embedding(&StoredEmbedding {
                article_id: article.id,
                vector: vector.clone(),
                model: self.embedder.model().to_string(),
                text_length: text.chars().count(),
                created_at: Utc::now(),
            })
            .await?;
        Ok(vector)
    }

    /// No duplicates found: mark unique, create a singleton cluster, and
    /// announce the article downstream.
    async fn finish_unique(&self, article: &Article, now: DateTime<Utc>) -> Result<()> {
        self.store
            .update_article_flags(&ArticleFlags {
                article_id: article.id,
                duplicate_checked: true,
                is_duplicate: false,
                original_article_id: None,
                processed_at: now,
            })
            .await?;
        self.store.put_cluster(&cluster::singleton(article, now)).await?;

        info!(article_id = %article.id, title = %article.title, "Unique article detected");
        if self
            .alerts_tx
            .send(UniqueArticleDetected {
                article_id: article.id,
            })
            .await
            .is_err()
        {
            warn!("Alert queue closed, dropping unique-article event");
        }
        Ok(())
    }

    /// Duplicates found: elect the original, write links and flags for every
    /// non-original member, and fold everyone into one cluster.
    async fn finish_matched(
        &self,
        article: &Article,
        matched: Vec<MatchedCandidate>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // Elect the original: earliest published, then earliest stored, then
        // id for determinism.
        let original = {
            let mut best = article.clone();
            for m in &matched {
                let c = &m.candidate;
                let earlier = (c.published_at, c.fetched_at, c.id)
                    < (best.published_at, best.fetched_at, best.id);
                if earlier {
                    best = c.clone();
                }
            }
            best
        };
        let new_is_original = original.id == article.id;

        // Link every non-original member to the original, using the
        // breakdown that justified its match against the new article.
        for m in &matched {
            if m.candidate.id == original.id {
                continue;
            }
            self.put_link(&original, &m.candidate, &m.breakdown, m.method, now)
                .await?;
            self.store
                .update_article_flags(&ArticleFlags {
                    article_id: m.candidate.id,
                    duplicate_checked: true,
                    is_duplicate: true,
                    original_article_id: Some(original.id),
                    processed_at: now,
                })
                .await?;
        }

        if new_is_original {
            self.store
                .update_article_flags(&ArticleFlags {
                    article_id: article.id,
                    duplicate_checked: true,
                    is_duplicate: false,
                    original_article_id: None,
                    processed_at: now,
                })
                .await?;
        } else {
            // The breakdown against the elected original itself
            if let Some(against_original) =
                matched.iter().find(|m| m.candidate.id == original.id)
            {
                self.put_link(
                    &original,
                    article,
                    &against_original.breakdown,
                    against_original.method,
                    now,
                )
                .await?;
            }
            self.store
                .update_article_flags(&ArticleFlags {
                    article_id: article.id,
                    duplicate_checked: true,
                    is_duplicate: true,
                    original_article_id: Some(original.id),
                    processed_at: now,
                })
                .await?;
            info!(
                article_id = %article.id,
                original_id = %original.id,
                "Duplicate article detected"
            );
        }

        self.update_clusters(article, &original, &matched, now).await?;

        if new_is_original {
            info!(article_id = %article.id, title = %article.title, "Unique article detected");
            if self
                .alerts_tx
                .send(UniqueArticleDetected {
                    article_id: article.id,
                })
                .await
                .is_err()
            {
                warn!("Alert queue closed, dropping unique-article event");
            }
        }
        Ok(())
    }

    async fn put_link(
        &self,
        original: &Article,
        duplicate: &Article,
        breakdown: &SimilarityBreakdown,
        method: DetectionMethod,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if original.id == duplicate.id {
            return Ok(());
        }
        let delta_hours =
            (duplicate.published_at - original.published_at).num_minutes() as f64 / 60.0;
        self.store
            .put_duplicate_link(&DuplicateLink {
                original_article_id: original.id,
                duplicate_article_id: duplicate.id,
                similarity_score: breakdown.overall,
                detection_method: method,
                breakdown: *breakdown,
                original_title: original.title.clone(),
                duplicate_title: duplicate.title.clone(),
                original_source: original.source.clone(),
                duplicate_source: duplicate.source.clone(),
                time_delta_hours: delta_hours,
                created_at: now,
            })
            .await
    }

    /// Fold the new article and every matched member into the original's
    /// cluster, merging clusters the duplicates previously spanned.
    async fn update_clusters(
        &self,
        article: &Article,
        original: &Article,
        matched: &[MatchedCandidate],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut member_ids: Vec<Uuid> = vec![article.id, original.id];
        for m in matched {
            member_ids.push(m.candidate.id);
        }
        member_ids.sort();
        member_ids.dedup();

        // Collect the clusters this group currently spans
        let mut spanned = Vec::new();
        for id in &member_ids {
            if let Some(found) = self.store.find_cluster_containing(*id).await? {
                if !spanned.iter().any(|c: &newswire_common::Cluster| c.id == found.id) {
                    spanned.push(found);
                }
            }
        }

        // Target is the original's cluster when it has one, else the oldest
        // spanned cluster, else a fresh singleton for the original.
        let mut target = match spanned
            .iter()
            .position(|c| c.article_ids.contains(&original.id))
        {
            Some(idx) => spanned.remove(idx),
            None => match spanned.is_empty() {
                false => {
                    let idx = spanned
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, c)| c.created_at)
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    spanned.remove(idx)
                }
                true => cluster::singleton(original, now),
            },
        };

        for c in &spanned {
            for id in &c.article_ids {
                if !target.article_ids.contains(id) {
                    target.article_ids.push(*id);
                }
            }
        }
        for id in &member_ids {
            if !target.article_ids.contains(id) {
                target.article_ids.push(*id);
            }
        }

        let mut members = Vec::new();
        for id in &target.article_ids {
            match self.store.find_article(*id).await? {
                Some(a) => members.push(a),
                None => warn!(article_id = %id, "Cluster member missing during update"),
            }
        }
        let refs: Vec<&Article> = members.iter().collect();
        cluster::refresh(&mut target, &refs, now);

        self.store.put_cluster(&target).await?;
        for c in &spanned {
            self.store.delete_cluster(c.id).await?;
        }
        Ok(())
    }
}

fn embed_text(article: &Article) -> String {
    let body = article.body_text();
    let snippet: String = body.chars().take(EMBED_SNIPPET_CHARS).collect();
    format!("{} {}", article.title, snippet)
}

fn comparison_doc(article: &Article) -> ComparisonDoc {
    ComparisonDoc {
        title: article.title.clone(),
        snippet: article
            .body_text()
            .chars()
            .take(VALIDATION_SNIPPET_CHARS)
            .collect(),
        source: article.source.clone(),
    }
}
