//! Whole-pipeline scenarios: normalizer → dedup engine → dispatcher over
//! the in-memory store, with HTTP boundaries stubbed out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::mpsc;

use newswire_ai::{pseudo_vector, TextEmbedder};
use newswire_alerts::{AlertChannel, AlertDispatcher, DispatcherConfig};
use newswire_common::text::FingerprintAlgo;
use newswire_common::{Alert, AlertStatus, ChannelKind, ChannelResult, Feed, Priority};
use newswire_dedup::{DedupConfig, DedupEngine};
use newswire_ingest::{Normalizer, RawItem};
use newswire_store::{MemoryStore, Store};

struct PseudoEmbedder;

#[async_trait]
impl TextEmbedder for PseudoEmbedder {
    async fn embed(&self, text: &str) -> Vec<f32> {
        pseudo_vector(text, 64)
    }

    fn model(&self) -> &str {
        "pseudo"
    }
}

struct CountingChannel {
    calls: AtomicUsize,
}

#[async_trait]
impl AlertChannel for CountingChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn deliver(&self, _alert: &Alert) -> ChannelResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ChannelResult {
            channel: ChannelKind::Webhook,
            success: true,
            status_code: Some(200),
            error: None,
        }
    }
}

fn feed(id: &str, name: &str) -> Feed {
    Feed {
        id: id.to_string(),
        name: name.to_string(),
        url: format!("https://{id}.example.com/rss"),
        category: "business".to_string(),
        priority: Priority::Medium,
        enabled: true,
        tags: vec!["markets".to_string()],
        last_fetched_at: None,
        articles_processed: 0,
        error_count: 0,
        last_error: None,
        last_error_at: None,
    }
}

fn item(link: &str, title: &str, body: &str, minutes_ago: i64) -> RawItem {
    RawItem {
        title: title.to_string(),
        link: link.to_string(),
        guid: Some(link.to_string()),
        summary: body.to_string(),
        content: Some(body.repeat(8)),
        published: Some(Utc::now() - Duration::minutes(minutes_ago)),
        author: None,
        image_url: None,
        categories: vec![],
    }
}

struct Pipeline {
    store: Arc<MemoryStore>,
    normalizer: Normalizer,
    engine: DedupEngine,
    dispatcher: AlertDispatcher,
    dedup_rx: mpsc::Receiver<newswire_common::events::ArticleStored>,
    alerts_rx: mpsc::Receiver<newswire_common::events::UniqueArticleDetected>,
    channel: Arc<CountingChannel>,
}

fn pipeline(max_alerts_per_hour: usize) -> Pipeline {
    let store = Arc::new(MemoryStore::new());
    let (dedup_tx, dedup_rx) = mpsc::channel(64);
    let (alerts_tx, alerts_rx) = mpsc::channel(64);

    let normalizer = Normalizer::new(
        Arc::clone(&store) as Arc<dyn Store>,
        FingerprintAlgo::Sha256,
        dedup_tx,
    );
    let engine = DedupEngine::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::new(PseudoEmbedder),
        None,
        DedupConfig::default(),
        alerts_tx,
    );
    let channel = Arc::new(CountingChannel {
        calls: AtomicUsize::new(0),
    });
    let dispatcher = AlertDispatcher::new(
        Arc::clone(&store) as Arc<dyn Store>,
        vec![Arc::clone(&channel) as Arc<dyn AlertChannel>],
        DispatcherConfig {
            cooldown_minutes: 5,
            max_alerts_per_hour,
            trusted_sources: vec![],
        },
    );

    Pipeline {
        store,
        normalizer,
        engine,
        dispatcher,
        dedup_rx,
        alerts_rx,
        channel,
    }
}

impl Pipeline {
    /// Push one raw item through every stage the way the daemon wires them.
    async fn ingest(&mut self, feed: &Feed, raw: &RawItem) {
        self.normalizer
            .process_item(feed, raw, None, Utc::now())
            .await
            .unwrap();
        while let Ok(event) = self.dedup_rx.try_recv() {
            self.engine.process(&event).await.unwrap();
        }
        while let Ok(event) = self.alerts_rx.try_recv() {
            self.dispatcher.handle(event.article_id).await.unwrap();
        }
    }
}

#[tokio::test]
async fn identical_repost_produces_exactly_one_alert() {
    let mut p = pipeline(20);
    let wire = feed("wire", "Example Wire");
    let gazette = feed("gazette", "The Gazette");
    let body = "Acme announced the acquisition of Beta in a deal valued at two billion dollars. ";

    p.ingest(
        &wire,
        &item(
            "https://wire.example.com/acme",
            "Acme acquires Beta for $2B",
            body,
            0,
        ),
    )
    .await;
    p.ingest(
        &gazette,
        &item(
            "https://gazette.example.com/acme",
            "Acme acquires Beta for $2B",
            body,
            0,
        ),
    )
    .await;

    // Both articles exist, one flagged duplicate with a hash link
    let original = p
        .store
        .find_article_by_url("https://wire.example.com/acme")
        .await
        .unwrap()
        .unwrap();
    let repost = p
        .store
        .find_article_by_url("https://gazette.example.com/acme")
        .await
        .unwrap()
        .unwrap();
    assert!(!original.is_duplicate);
    assert!(repost.is_duplicate);
    assert_eq!(repost.original_article_id, Some(original.id));
    assert_eq!(p.store.all_links().await.len(), 1);

    // Exactly one alert, for the original
    let alerts = p.store.all_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].article_id, original.id);
    assert_eq!(alerts[0].status, AlertStatus::Sent);
    assert_eq!(p.channel.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rate_limit_applies_across_the_whole_pipeline() {
    let mut p = pipeline(2);
    let wire = feed("wire", "Example Wire");

    let stories = [
        ("https://wire.example.com/1", "Breaking merger at Acme Corp announced"),
        ("https://wire.example.com/2", "Urgent recall of Gamma widgets expands"),
        ("https://wire.example.com/3", "Developing outage at Delta systems continues"),
    ];
    for (url, title) in stories {
        p.ingest(
            &wire,
            &item(url, title, &format!("{title}. Further detail follows. "), 0),
        )
        .await;
    }

    let sent: Vec<_> = p
        .store
        .all_alerts()
        .await
        .into_iter()
        .filter(|a| a.status == AlertStatus::Sent)
        .collect();
    assert_eq!(sent.len(), 2, "third story must be rate limited");
    assert_eq!(p.channel.calls.load(Ordering::SeqCst), 2);

    let filtered = p.store.metrics_named("filtered_alerts").await;
    assert_eq!(filtered.len(), 1);
}

#[tokio::test]
async fn restart_recovery_reprocesses_only_unchecked_articles() {
    let mut p = pipeline(20);
    let wire = feed("wire", "Example Wire");

    // First article goes through the full pipeline
    p.ingest(
        &wire,
        &item(
            "https://wire.example.com/done",
            "Completed story about Acme earnings",
            "Acme reported quarterly earnings above expectations. ",
            0,
        ),
    )
    .await;

    // Second article is persisted but its event is "lost" (no engine run)
    p.normalizer
        .process_item(
            &wire,
            &item(
                "https://wire.example.com/lost",
                "Unprocessed story about Gamma layoffs",
                "Gamma announced restructuring plans affecting many roles. ",
                0,
            ),
            None,
            Utc::now(),
        )
        .await
        .unwrap();

    let unchecked = p.store.list_unchecked_articles(100).await.unwrap();
    assert_eq!(unchecked.len(), 1);
    assert_eq!(unchecked[0].url, "https://wire.example.com/lost");

    // Replaying the recovery batch completes the pipeline for it
    while let Ok(event) = p.dedup_rx.try_recv() {
        p.engine.process(&event).await.unwrap();
    }
    assert!(p
        .store
        .list_unchecked_articles(100)
        .await
        .unwrap()
        .is_empty());
}
