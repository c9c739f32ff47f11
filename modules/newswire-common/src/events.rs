//! Typed events passed between pipeline stages over bounded queues.
//!
//! Each stage emits facts, not commands: the article is already persisted
//! when its event is enqueued, so the next stage's store queries see it.

use uuid::Uuid;

/// Normalizer → dedup engine: a new article was written to the store with
/// `duplicate_checked = false`.
#[derive(Debug, Clone)]
pub struct ArticleStored {
    pub article_id: Uuid,
    /// Re-enqueue attempts after recoverable scoring errors. The engine
    /// drops the event past 3 and leaves the article for reprocessing.
    pub attempt: u32,
}

impl ArticleStored {
    pub fn new(article_id: Uuid) -> Self {
        Self {
            article_id,
            attempt: 0,
        }
    }

    pub fn retry(&self) -> Self {
        Self {
            article_id: self.article_id,
            attempt: self.attempt + 1,
        }
    }
}

/// Dedup engine → alert dispatcher: the article was elected original of its
/// story (singleton or cluster head). Duplicates never produce this event.
#[derive(Debug, Clone)]
pub struct UniqueArticleDetected {
    pub article_id: Uuid,
}
