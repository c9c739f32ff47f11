//! Feed scheduling: timed fan-out of fetch jobs across enabled feeds.
//!
//! One cycle fetches every enabled feed with bounded concurrency. If a
//! previous cycle is still running when the tick fires, the tick is
//! skipped. Per-feed failure is contained: the cycle continues with the
//! other feeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{info, warn};

use newswire_common::{Feed, Metric, NewswireError};
use newswire_store::Store;

use crate::extract::PageExtractor;
use crate::fetcher::FeedFetcher;
use crate::normalizer::{NormalizeOutcome, Normalizer};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub refresh_interval: std::time::Duration,
    pub max_concurrent_feeds: usize,
    pub full_page_extraction: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: std::time::Duration::from_secs(5 * 60),
            max_concurrent_feeds: 10,
            full_page_extraction: false,
        }
    }
}

/// Outcome counters for one scheduler cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub feeds_dispatched: usize,
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub items_seen: usize,
    pub articles_stored: usize,
    pub known_urls: usize,
    pub exact_duplicates: usize,
    pub duration_ms: u64,
}

#[derive(Default)]
struct FeedOutcome {
    ok: bool,
    items: usize,
    stored: usize,
    known_urls: usize,
    exact_duplicates: usize,
}

pub struct FeedScheduler {
    store: Arc<dyn Store>,
    fetcher: FeedFetcher,
    extractor: Option<PageExtractor>,
    normalizer: Arc<Normalizer>,
    config: SchedulerConfig,
    cycle_running: AtomicBool,
}

impl FeedScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: FeedFetcher,
        normalizer: Arc<Normalizer>,
        config: SchedulerConfig,
    ) -> Self {
        let extractor = config.full_page_extraction.then(PageExtractor::new);
        Self {
            store,
            fetcher,
            extractor,
            normalizer,
            config,
            cycle_running: AtomicBool::new(false),
        }
    }

    /// Tick until shutdown. The first cycle runs immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.refresh_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            self.tick().await;
        }
        info!("Feed scheduler stopped");
    }

    /// Run one cycle unless the previous one is still in flight.
    pub async fn tick(&self) {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Previous fetch cycle still running, skipping tick");
            return;
        }
        let stats = self.run_cycle().await;
        self.cycle_running.store(false, Ordering::SeqCst);
        self.record_cycle_metrics(&stats).await;
        info!(
            feeds = stats.feeds_dispatched,
            ok = stats.feeds_ok,
            failed = stats.feeds_failed,
            items = stats.items_seen,
            stored = stats.articles_stored,
            duration_ms = stats.duration_ms,
            "Fetch cycle complete"
        );
    }

    async fn run_cycle(&self) -> CycleStats {
        let started = Instant::now();
        let feeds: Vec<Feed> = match self.store.list_feeds().await {
            Ok(feeds) => feeds.into_iter().filter(|f| f.enabled).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list feeds, skipping cycle");
                return CycleStats::default();
            }
        };

        let mut stats = CycleStats {
            feeds_dispatched: feeds.len(),
            ..Default::default()
        };

        let outcomes: Vec<FeedOutcome> = stream::iter(feeds)
            .map(|feed| self.process_feed(feed))
            .buffer_unordered(self.config.max_concurrent_feeds)
            .collect()
            .await;

        for outcome in outcomes {
            if outcome.ok {
                stats.feeds_ok += 1;
            } else {
                stats.feeds_failed += 1;
            }
            stats.items_seen += outcome.items;
            stats.articles_stored += outcome.stored;
            stats.known_urls += outcome.known_urls;
            stats.exact_duplicates += outcome.exact_duplicates;
        }
        stats.duration_ms = started.elapsed().as_millis() as u64;
        stats
    }

    /// Fetch one feed and push its items through the normalizer in feed
    /// order.
    async fn process_feed(&self, feed: Feed) -> FeedOutcome {
        let mut outcome = FeedOutcome::default();
        let fetched_at = Utc::now();

        let fetched = match self.fetcher.fetch(&feed).await {
            Ok(f) => f,
            Err(e) => {
                warn!(feed = %feed.id, error = %e, "Feed fetch failed");
                if let Err(store_err) = self
                    .store
                    .record_feed_error(&feed.id, &e.to_string(), fetched_at)
                    .await
                {
                    warn!(feed = %feed.id, error = %store_err, "Failed to record feed error");
                }
                return outcome;
            }
        };

        outcome.items = fetched.items.len();

        for item in &fetched.items {
            let page_content = match &self.extractor {
                Some(extractor) => extractor.extract(&item.link).await,
                None => None,
            };
            match self
                .normalizer
                .process_item(&feed, item, page_content, fetched_at)
                .await
            {
                Ok(NormalizeOutcome::Stored) => outcome.stored += 1,
                Ok(NormalizeOutcome::KnownUrl) => outcome.known_urls += 1,
                Ok(NormalizeOutcome::ExactDuplicate) => outcome.exact_duplicates += 1,
                Err(NewswireError::Store(reason)) => {
                    warn!(feed = %feed.id, url = %item.link, reason, "Item store failure");
                }
                Err(e) => {
                    warn!(feed = %feed.id, url = %item.link, error = %e, "Item skipped");
                }
            }
        }

        if let Err(e) = self
            .store
            .record_feed_success(&feed.id, outcome.stored as u64, fetched_at)
            .await
        {
            warn!(feed = %feed.id, error = %e, "Failed to record feed success");
        }
        outcome.ok = true;
        outcome
    }

    async fn record_cycle_metrics(&self, stats: &CycleStats) {
        let now = Utc::now();
        let metrics = [
            Metric::counter("cycle_feeds_dispatched", stats.feeds_dispatched as f64, now),
            Metric::counter("cycle_feeds_failed", stats.feeds_failed as f64, now),
            Metric::counter("cycle_items_seen", stats.items_seen as f64, now),
            Metric::counter("cycle_articles_stored", stats.articles_stored as f64, now),
            Metric::counter("cycle_exact_duplicates", stats.exact_duplicates as f64, now),
            Metric::counter("cycle_duration_ms", stats.duration_ms as f64, now),
        ];
        for metric in metrics {
            if let Err(e) = self.store.put_metric(&metric).await {
                warn!(error = %e, "Failed to record cycle metric");
            }
        }
    }
}
