//! Stage wiring: bounded queues, worker tasks, and reverse-order shutdown.
//!
//! Dataflow is strictly forward; a full queue blocks its producer, which
//! propagates backward to the scheduler and effectively skips the next
//! cycle. Shutdown stops the scheduler first, then lets each stage drain:
//! dropping a stage's sender closes the downstream receiver.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use newswire_ai::{DuplicateValidator, EmbeddingService, LlmValidator, TextEmbedder};
use newswire_alerts::{
    AlertChannel, AlertDispatcher, DispatcherConfig, EmailChannel, SlackChannel, WebhookChannel,
};
use newswire_common::events::ArticleStored;
use newswire_common::{AppConfig, FeedsConfig};
use newswire_dedup::{DedupConfig, DedupEngine, SignalWeights, TfIdfConfig};
use newswire_ingest::{FeedFetcher, FeedScheduler, FetchPolicy, Normalizer, SchedulerConfig};
use newswire_store::Store;

/// Bounded capacity of each inter-stage queue.
const QUEUE_CAPACITY: usize = 256;
/// Cadence of the maintenance loop (compaction, cluster merges, cooldown GC).
const MAINTENANCE_INTERVAL_SECS: u64 = 3600;
/// How many unchecked articles to re-enqueue at startup.
const RECOVERY_BATCH: usize = 500;
/// Model used for borderline duplicate validation.
const VALIDATION_MODEL: &str = "gpt-4o-mini";

/// Build every stage from configuration and run until `shutdown` flips.
pub async fn run(
    store: Arc<dyn Store>,
    config: &AppConfig,
    feeds: &FeedsConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (dedup_tx, dedup_rx) = mpsc::channel::<ArticleStored>(QUEUE_CAPACITY);
    let (alerts_tx, alerts_rx) = mpsc::channel(QUEUE_CAPACITY);

    // --- Ingestion ---
    let fetch_policy = FetchPolicy {
        timeout: Duration::from_secs(feeds.global.timeout_seconds),
        retry_attempts: feeds.global.retry_attempts,
        retry_delay: Duration::from_millis(feeds.global.retry_delay_ms),
    };
    let normalizer = Arc::new(Normalizer::new(
        Arc::clone(&store),
        config.fingerprint_algo,
        dedup_tx.clone(),
    ));
    let scheduler = FeedScheduler::new(
        Arc::clone(&store),
        FeedFetcher::new(fetch_policy),
        normalizer,
        SchedulerConfig {
            refresh_interval: Duration::from_secs(feeds.global.refresh_interval_minutes * 60),
            max_concurrent_feeds: config.max_concurrent_feeds,
            full_page_extraction: config.full_page_extraction,
        },
    );

    // --- Dedup ---
    let embedder: Arc<dyn TextEmbedder> = Arc::new(EmbeddingService::new(
        config.openai_api_key.as_deref(),
        &config.embedding_model,
        config.vector_dimension,
    ));
    let validator: Option<Arc<dyn DuplicateValidator>> = config
        .openai_api_key
        .as_deref()
        .map(|key| Arc::new(LlmValidator::new(key, VALIDATION_MODEL)) as Arc<dyn DuplicateValidator>);
    let engine = Arc::new(DedupEngine::new(
        Arc::clone(&store),
        embedder,
        validator,
        DedupConfig {
            similarity_threshold: config.similarity_threshold,
            time_window_hours: config.time_window_hours,
            weights: SignalWeights {
                title: config.title_weight,
                content: config.content_weight,
                entity: config.entity_weight,
            },
            batch_size: config.batch_size,
            max_candidates: 50,
            tfidf: TfIdfConfig {
                max_vocabulary: config.max_vocabulary,
                max_doc_tokens: config.max_doc_tokens,
            },
        },
        alerts_tx,
    ));

    // --- Alerting ---
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&store),
        build_channels(config),
        DispatcherConfig {
            cooldown_minutes: config.alert_cooldown_minutes,
            max_alerts_per_hour: config.max_alerts_per_hour,
            trusted_sources: config.trusted_sources.clone(),
        },
    ));

    // Restart recovery: re-enqueue articles that never finished checking,
    // and surface alerts still pending from a previous run.
    match store.list_unchecked_articles(RECOVERY_BATCH).await {
        Ok(unchecked) if !unchecked.is_empty() => {
            info!(count = unchecked.len(), "Re-enqueueing unchecked articles");
            for article in unchecked {
                if dedup_tx.send(ArticleStored::new(article.id)).await.is_err() {
                    break;
                }
            }
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to list unchecked articles at startup"),
    }
    match store.list_pending_alerts().await {
        Ok(pending) if !pending.is_empty() => {
            info!(count = pending.len(), "Pending alerts found from previous run");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to list pending alerts at startup"),
    }
    drop(dedup_tx);

    // --- Spawn stages ---
    let scheduler_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };
    let engine_task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(dedup_rx).await })
    };
    let dispatcher_task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.run(alerts_rx).await })
    };
    let maintenance_task = {
        let store = Arc::clone(&store);
        let dispatcher = Arc::clone(&dispatcher);
        let mut shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The immediate first tick would compact on boot; skip it
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.changed() => break,
                }
                if *shutdown.borrow() {
                    break;
                }
                let now = Utc::now();
                match store.compact(now).await {
                    Ok(stats) => info!(
                        articles = stats.articles_removed,
                        clusters = stats.clusters_removed,
                        embeddings = stats.embeddings_removed,
                        alerts = stats.alerts_removed,
                        "Store compaction complete"
                    ),
                    Err(e) => warn!(error = %e, "Store compaction failed"),
                }
                let since = now - chrono::Duration::hours(24);
                match newswire_dedup::cluster::run_merge_pass(store.as_ref(), since, now).await {
                    Ok(merged) if merged > 0 => info!(merged, "Offline cluster merge complete"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Cluster merge pass failed"),
                }
                dispatcher.gc_cooldown_index(now).await;
            }
        })
    };

    // Shutdown proceeds in reverse dataflow order: the scheduler stops
    // ticking, the normalizer's sender drops with it, dedup drains and
    // closes the alert queue, the dispatcher drains last.
    scheduler_task.await?;
    engine_task.await?;
    // The engine's sender must go with it or the alert queue never closes
    drop(engine);
    dispatcher_task.await?;
    maintenance_task.await?;
    info!("Pipeline stopped");
    Ok(())
}

fn build_channels(config: &AppConfig) -> Vec<Arc<dyn AlertChannel>> {
    let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();
    if config.webhook_enabled {
        if let Some(url) = &config.webhook_url {
            channels.push(Arc::new(WebhookChannel::new(url.clone())));
        }
    }
    if config.slack_enabled {
        if let Some(url) = &config.slack_webhook_url {
            channels.push(Arc::new(SlackChannel::new(
                url.clone(),
                config.slack_channel.clone(),
            )));
        }
    }
    if config.email_enabled {
        if let Some(smtp) = &config.smtp {
            match EmailChannel::new(smtp) {
                Ok(channel) => channels.push(Arc::new(channel)),
                Err(e) => warn!(error = %e, "Failed to build email channel"),
            }
        }
    }
    channels
}
