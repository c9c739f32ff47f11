//! Dispatcher scenarios over the in-memory store with mock channels.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use newswire_alerts::{
    AlertChannel, AlertDispatcher, DispatchOutcome, DispatcherConfig, FilterReason,
};
use newswire_common::{
    Alert, AlertStatus, Article, ChannelKind, ChannelResult, Entity, EntityType, Priority,
};
use newswire_store::{MemoryStore, Store};

struct MockChannel {
    kind: ChannelKind,
    succeed: bool,
    status_code: Option<u16>,
    calls: AtomicUsize,
}

impl MockChannel {
    fn new(kind: ChannelKind, succeed: bool, status_code: Option<u16>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            succeed,
            status_code,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AlertChannel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn deliver(&self, _alert: &Alert) -> ChannelResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ChannelResult {
            channel: self.kind,
            success: self.succeed,
            status_code: self.status_code,
            error: (!self.succeed).then(|| "mock failure".to_string()),
        }
    }
}

fn good_article(title: &str, category: &str) -> Article {
    let now = Utc::now();
    Article {
        id: Uuid::new_v4(),
        url: format!("https://wire.example.com/{}", Uuid::new_v4()),
        title: title.to_string(),
        summary: "Summary of the story".to_string(),
        content: Some("word ".repeat(150)),
        source: "wire".to_string(),
        source_id: "wire-1".to_string(),
        category: category.to_string(),
        tags: vec!["markets".to_string()],
        priority: Priority::Medium,
        published_at: now - Duration::minutes(10),
        fetched_at: now,
        author: None,
        image_url: None,
        language: None,
        entities: vec![Entity {
            name: "Acme".to_string(),
            entity_type: EntityType::Organization,
            confidence: 0.9,
        }],
        content_hash: Uuid::new_v4().to_string(),
        duplicate_checked: true,
        is_duplicate: false,
        original_article_id: None,
        processed_at: Some(now),
        alert_sent: false,
    }
}

fn dispatcher_with(
    store: Arc<MemoryStore>,
    channels: Vec<Arc<dyn AlertChannel>>,
    max_per_hour: usize,
) -> AlertDispatcher {
    AlertDispatcher::new(
        store as Arc<dyn Store>,
        channels,
        DispatcherConfig {
            cooldown_minutes: 5,
            max_alerts_per_hour: max_per_hour,
            trusted_sources: vec![],
        },
    )
}

#[tokio::test]
async fn rate_limit_filters_third_alert_in_the_hour() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let dispatcher = dispatcher_with(Arc::clone(&store), vec![webhook.clone() as Arc<dyn AlertChannel>], 2);

    let titles = [
        "Breaking merger announcement today",
        "Urgent funding round disclosed",
        "Developing acquisition story tonight",
    ];
    let mut outcomes = Vec::new();
    for title in titles {
        let article = good_article(title, "business");
        store.put_article(&article).await.unwrap();
        outcomes.push(dispatcher.handle(article.id).await.unwrap());
    }

    assert!(matches!(outcomes[0], DispatchOutcome::Sent(_)));
    assert!(matches!(outcomes[1], DispatchOutcome::Sent(_)));
    assert_eq!(
        outcomes[2],
        DispatchOutcome::Filtered(FilterReason::RateLimited)
    );
    assert_eq!(webhook.calls.load(Ordering::SeqCst), 2);

    let filtered = store.metrics_named("filtered_alerts").await;
    assert_eq!(filtered.len(), 1);
    assert_eq!(
        filtered[0].labels.get("reason").map(String::as_str),
        Some("rate_limited")
    );
}

#[tokio::test]
async fn partial_channel_failure_still_counts_as_sent() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, false, Some(500));
    let slack = MockChannel::new(ChannelKind::Slack, true, Some(200));
    let email = MockChannel::new(ChannelKind::Email, false, None);
    let dispatcher = dispatcher_with(
        Arc::clone(&store),
        vec![webhook as Arc<dyn AlertChannel>, slack, email],
        20,
    );

    // High-priority business article selects all three channels
    let article = good_article("Breaking: Acme merger with Beta", "business");
    store.put_article(&article).await.unwrap();
    let outcome = dispatcher.handle(article.id).await.unwrap();

    let DispatchOutcome::Sent(alert_id) = outcome else {
        panic!("expected sent, got {outcome:?}");
    };
    let alert = store.find_alert(alert_id).await.unwrap().unwrap();
    assert_eq!(alert.status, AlertStatus::Sent);
    assert!(alert.sent_at.is_some());
    assert_eq!(alert.results.len(), 3);

    let by_channel = |kind: ChannelKind| {
        alert
            .results
            .iter()
            .find(|r| r.channel == kind)
            .expect("result for channel")
    };
    assert!(!by_channel(ChannelKind::Webhook).success);
    assert_eq!(by_channel(ChannelKind::Webhook).status_code, Some(500));
    assert!(by_channel(ChannelKind::Slack).success);
    assert!(!by_channel(ChannelKind::Email).success);

    // The article records the sent alert
    let stored = store.find_article(article.id).await.unwrap().unwrap();
    assert!(stored.alert_sent);
}

#[tokio::test]
async fn all_channels_failing_marks_alert_failed() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, false, Some(502));
    let dispatcher = dispatcher_with(Arc::clone(&store), vec![webhook as Arc<dyn AlertChannel>], 20);

    let article = good_article("Breaking merger story", "business");
    store.put_article(&article).await.unwrap();
    let outcome = dispatcher.handle(article.id).await.unwrap();

    let DispatchOutcome::Failed(alert_id) = outcome else {
        panic!("expected failed, got {outcome:?}");
    };
    let alert = store.find_alert(alert_id).await.unwrap().unwrap();
    assert_eq!(alert.status, AlertStatus::Failed);
    assert!(alert.results.iter().all(|r| !r.success));

    let stored = store.find_article(article.id).await.unwrap().unwrap();
    assert!(!stored.alert_sent);
}

#[tokio::test]
async fn cooldown_filters_similar_item_from_same_source() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let dispatcher = dispatcher_with(Arc::clone(&store), vec![webhook as Arc<dyn AlertChannel>], 20);

    let first = good_article("Acme acquires Beta for billions", "business");
    store.put_article(&first).await.unwrap();
    assert!(matches!(
        dispatcher.handle(first.id).await.unwrap(),
        DispatchOutcome::Sent(_)
    ));

    // Same source, same leading title words
    let second = good_article("Acme acquires Beta, regulators react", "business");
    store.put_article(&second).await.unwrap();
    assert_eq!(
        dispatcher.handle(second.id).await.unwrap(),
        DispatchOutcome::Filtered(FilterReason::Cooldown)
    );
}

#[tokio::test]
async fn low_quality_article_is_filtered() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let dispatcher = dispatcher_with(Arc::clone(&store), vec![webhook.clone() as Arc<dyn AlertChannel>], 20);

    let now = Utc::now();
    let mut thin = good_article("Short note", "sports");
    thin.content = Some("tiny".to_string());
    thin.entities = vec![];
    thin.published_at = now - Duration::hours(10);
    store.put_article(&thin).await.unwrap();

    assert_eq!(
        dispatcher.handle(thin.id).await.unwrap(),
        DispatchOutcome::Filtered(FilterReason::LowQuality)
    );
    assert_eq!(webhook.calls.load(Ordering::SeqCst), 0);
    assert!(store.all_alerts().await.is_empty());
}

#[tokio::test]
async fn medium_priority_general_article_only_uses_webhook() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let slack = MockChannel::new(ChannelKind::Slack, true, Some(200));
    let email = MockChannel::new(ChannelKind::Email, true, None);
    let dispatcher = dispatcher_with(
        Arc::clone(&store),
        vec![webhook.clone() as Arc<dyn AlertChannel>, slack.clone(), email.clone()],
        20,
    );

    let article = good_article("Community garden opens downtown", "general");
    store.put_article(&article).await.unwrap();
    let outcome = dispatcher.handle(article.id).await.unwrap();

    let DispatchOutcome::Sent(alert_id) = outcome else {
        panic!("expected sent");
    };
    let alert = store.find_alert(alert_id).await.unwrap().unwrap();
    assert_eq!(alert.priority, Priority::Medium);
    assert_eq!(alert.channels, vec![ChannelKind::Webhook]);
    assert_eq!(webhook.calls.load(Ordering::SeqCst), 1);
    assert_eq!(slack.calls.load(Ordering::SeqCst), 0);
    assert_eq!(email.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn technology_category_routes_to_slack() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let slack = MockChannel::new(ChannelKind::Slack, true, Some(200));
    let dispatcher = dispatcher_with(
        Arc::clone(&store),
        vec![webhook.clone() as Arc<dyn AlertChannel>, slack.clone()],
        20,
    );

    let article = good_article("Chipmaker unveils new process", "technology");
    store.put_article(&article).await.unwrap();
    dispatcher.handle(article.id).await.unwrap();

    assert_eq!(webhook.calls.load(Ordering::SeqCst), 1);
    assert_eq!(slack.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn resend_replays_channels_and_increments_counter() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let dispatcher = dispatcher_with(Arc::clone(&store), vec![webhook.clone() as Arc<dyn AlertChannel>], 20);

    let article = good_article("Breaking merger update", "business");
    store.put_article(&article).await.unwrap();
    let DispatchOutcome::Sent(alert_id) = dispatcher.handle(article.id).await.unwrap() else {
        panic!("expected sent");
    };

    let outcome = dispatcher.resend(alert_id).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Sent(_)));
    assert_eq!(webhook.calls.load(Ordering::SeqCst), 2);

    let alert = store.find_alert(alert_id).await.unwrap().unwrap();
    assert_eq!(alert.resend_count, 1);
}

#[tokio::test]
async fn cooldown_gc_allows_alerts_after_expiry() {
    let store = Arc::new(MemoryStore::new());
    let webhook = MockChannel::new(ChannelKind::Webhook, true, Some(200));
    let dispatcher = dispatcher_with(Arc::clone(&store), vec![webhook as Arc<dyn AlertChannel>], 20);

    let first = good_article("Acme acquires Beta for billions", "business");
    store.put_article(&first).await.unwrap();
    dispatcher.handle(first.id).await.unwrap();

    // GC far in the future clears the index entry
    dispatcher
        .gc_cooldown_index(Utc::now() + Duration::hours(2))
        .await;

    let second = good_article("Acme acquires Beta, closing confirmed", "business");
    store.put_article(&second).await.unwrap();
    assert!(matches!(
        dispatcher.handle(second.id).await.unwrap(),
        DispatchOutcome::Sent(_)
    ));
}
