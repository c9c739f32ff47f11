//! Alert dispatch: admission gate, channel fan-out, result tracking.
//!
//! Admission order: rate limit, cooldown, quality threshold. Rejected
//! articles never become alerts; the rejection reason is counted. Delivery
//! runs all selected channels concurrently under a per-channel timeout; an
//! alert is `sent` iff at least one channel succeeded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use newswire_common::events::UniqueArticleDetected;
use newswire_common::{
    Alert, AlertStatus, Article, ChannelKind, ChannelResult, Metric, NewswireError, Priority,
    Result,
};
use newswire_store::Store;

use crate::channels::AlertChannel;
use crate::priority::calculate_priority;
use crate::quality;

const CHANNEL_TIMEOUT_SECS: u64 = 10;
/// Categories routed to Slack.
const SLACK_CATEGORIES: &[&str] = &["business", "technology"];

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub cooldown_minutes: i64,
    pub max_alerts_per_hour: usize,
    pub trusted_sources: Vec<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 5,
            max_alerts_per_hour: 20,
            trusted_sources: vec![],
        }
    }
}

/// Why an article was filtered at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    RateLimited,
    Cooldown,
    LowQuality,
}

impl FilterReason {
    fn label(self) -> &'static str {
        match self {
            FilterReason::RateLimited => "rate_limited",
            FilterReason::Cooldown => "cooldown",
            FilterReason::LowQuality => "low_quality",
        }
    }
}

/// Outcome of handling one unique-article event, exposed for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent(Uuid),
    Failed(Uuid),
    Filtered(FilterReason),
}

pub struct AlertDispatcher {
    store: Arc<dyn Store>,
    channels: Vec<Arc<dyn AlertChannel>>,
    config: DispatcherConfig,
    /// Coarse similarity key → last alert creation time. Process-local;
    /// GC'd hourly by the maintenance loop.
    cooldown_index: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        channels: Vec<Arc<dyn AlertChannel>>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            channels,
            config,
            cooldown_index: Mutex::new(HashMap::new()),
        }
    }

    /// Consume unique-article events until the queue closes. Alerts still
    /// `pending` at that point stay replayable in the store.
    pub async fn run(&self, mut rx: mpsc::Receiver<UniqueArticleDetected>) {
        while let Some(event) = rx.recv().await {
            match self.handle(event.article_id).await {
                Ok(outcome) => debug!(?outcome, "Alert event handled"),
                Err(e) => warn!(article_id = %event.article_id, error = %e, "Alert handling failed"),
            }
        }
        info!("Alert dispatcher drained, shutting down");
    }

    /// Admission gate plus dispatch for one elected-original article.
    pub async fn handle(&self, article_id: Uuid) -> Result<DispatchOutcome> {
        let article = self
            .store
            .find_article(article_id)
            .await?
            .ok_or_else(|| NewswireError::Store(format!("no article {article_id}")))?;

        let now = Utc::now();

        if let Some(reason) = self.admission_reject_reason(&article, now).await? {
            self.count_filtered(reason, now).await;
            info!(
                article_id = %article.id,
                reason = reason.label(),
                "Alert filtered at admission"
            );
            return Ok(DispatchOutcome::Filtered(reason));
        }

        let priority = calculate_priority(&article);
        let channels = self.select_channels(&article, priority);

        let alert = Alert {
            id: Uuid::new_v4(),
            article_id: article.id,
            title: article.title.clone(),
            summary: article.summary.clone(),
            source: article.source.clone(),
            category: article.category.clone(),
            priority,
            url: article.url.clone(),
            published_at: article.published_at,
            entities: article.entities.clone(),
            tags: article.tags.clone(),
            channels: channels.iter().map(|c| c.kind()).collect(),
            status: AlertStatus::Pending,
            created_at: now,
            sent_at: None,
            results: vec![],
            resend_count: 0,
        };
        self.store.put_alert(&alert).await?;
        self.cooldown_index
            .lock()
            .await
            .insert(cooldown_key(&article.source, &article.title), now);

        let results = self.dispatch(&alert, &channels).await;
        let any_success = results.iter().any(|r| r.success);
        let status = if any_success {
            AlertStatus::Sent
        } else {
            AlertStatus::Failed
        };
        let sent_at = Utc::now();
        self.store
            .update_alert_status(alert.id, status, Some(sent_at), &results)
            .await?;

        if any_success {
            self.store.mark_alert_sent(article.id).await?;
            info!(alert_id = %alert.id, article_id = %article.id, "Alert sent");
            Ok(DispatchOutcome::Sent(alert.id))
        } else {
            warn!(alert_id = %alert.id, article_id = %article.id, "Every channel failed");
            Ok(DispatchOutcome::Failed(alert.id))
        }
    }

    /// Operator-initiated resend of an existing alert.
    pub async fn resend(&self, alert_id: Uuid) -> Result<DispatchOutcome> {
        let alert = self
            .store
            .find_alert(alert_id)
            .await?
            .ok_or_else(|| NewswireError::Store(format!("no alert {alert_id}")))?;

        let channels: Vec<Arc<dyn AlertChannel>> = self
            .channels
            .iter()
            .filter(|c| alert.channels.contains(&c.kind()))
            .cloned()
            .collect();

        let results = self.dispatch(&alert, &channels).await;
        let any_success = results.iter().any(|r| r.success);
        let status = if any_success {
            AlertStatus::Sent
        } else {
            AlertStatus::Failed
        };
        self.store
            .update_alert_status(alert.id, status, Some(Utc::now()), &results)
            .await?;
        self.store.increment_alert_resend(alert.id).await?;

        if any_success {
            Ok(DispatchOutcome::Sent(alert.id))
        } else {
            Ok(DispatchOutcome::Failed(alert.id))
        }
    }

    /// First failing admission rule, if any. Order: rate limit, cooldown,
    /// quality.
    async fn admission_reject_reason(
        &self,
        article: &Article,
        now: DateTime<Utc>,
    ) -> Result<Option<FilterReason>> {
        let recent = self
            .store
            .count_alerts_since(now - Duration::hours(1))
            .await?;
        if recent >= self.config.max_alerts_per_hour {
            return Ok(Some(FilterReason::RateLimited));
        }

        let key = cooldown_key(&article.source, &article.title);
        let cooldown = Duration::minutes(self.config.cooldown_minutes);
        if let Some(last) = self.cooldown_index.lock().await.get(&key) {
            if now - *last < cooldown {
                return Ok(Some(FilterReason::Cooldown));
            }
        }

        if !quality::admit(article, &self.config.trusted_sources, now) {
            return Ok(Some(FilterReason::LowQuality));
        }
        Ok(None)
    }

    /// Channel selection: webhook always when enabled, email only for high
    /// priority, Slack for business/technology.
    fn select_channels(&self, article: &Article, priority: Priority) -> Vec<Arc<dyn AlertChannel>> {
        self.channels
            .iter()
            .filter(|channel| match channel.kind() {
                ChannelKind::Webhook => true,
                ChannelKind::Email => priority == Priority::High,
                ChannelKind::Slack => SLACK_CATEGORIES.contains(&article.category.as_str()),
            })
            .cloned()
            .collect()
    }

    /// Fan out to every selected channel concurrently, each under its own
    /// timeout.
    async fn dispatch(
        &self,
        alert: &Alert,
        channels: &[Arc<dyn AlertChannel>],
    ) -> Vec<ChannelResult> {
        let deliveries = channels.iter().map(|channel| {
            let channel = Arc::clone(channel);
            let alert = alert.clone();
            async move {
                match tokio::time::timeout(
                    StdDuration::from_secs(CHANNEL_TIMEOUT_SECS),
                    channel.deliver(&alert),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => ChannelResult {
                        channel: channel.kind(),
                        success: false,
                        status_code: None,
                        error: Some("delivery timed out".to_string()),
                    },
                }
            }
        });
        join_all(deliveries).await
    }

    async fn count_filtered(&self, reason: FilterReason, now: DateTime<Utc>) {
        let metric =
            Metric::counter("filtered_alerts", 1.0, now).with_label("reason", reason.label());
        if let Err(e) = self.store.put_metric(&metric).await {
            warn!(error = %e, "Failed to record filtered-alert metric");
        }
    }

    /// Drop cooldown entries old enough to be irrelevant. Called hourly.
    pub async fn gc_cooldown_index(&self, now: DateTime<Utc>) {
        let horizon = Duration::minutes(self.config.cooldown_minutes.max(60));
        let mut index = self.cooldown_index.lock().await;
        let before = index.len();
        index.retain(|_, last| now - *last < horizon);
        let removed = before - index.len();
        if removed > 0 {
            debug!(removed, remaining = index.len(), "Cooldown index pruned");
        }
    }
}

/// Coarse similarity key: source plus the first three normalized title
/// words of four characters or more.
pub fn cooldown_key(source: &str, title: &str) -> String {
    let words: Vec<String> = title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .take(3)
        .map(str::to_string)
        .collect();
    format!("{source}:{}", words.join("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_key_takes_top_three_long_words() {
        let key = cooldown_key("wire", "Acme to acquire Beta in $2 billion deal");
        assert_eq!(key, "wire:acme-acquire-beta");
    }

    #[test]
    fn cooldown_key_is_case_and_punctuation_insensitive() {
        let a = cooldown_key("wire", "ACME Acquires Beta!");
        let b = cooldown_key("wire", "acme acquires beta");
        assert_eq!(a, b);
    }

    #[test]
    fn cooldown_key_differs_by_source() {
        let a = cooldown_key("wire", "Acme acquires Beta");
        let b = cooldown_key("gazette", "Acme acquires Beta");
        assert_ne!(a, b);
    }

    #[test]
    fn short_titles_produce_stable_keys() {
        assert_eq!(cooldown_key("wire", "Up now"), "wire:");
        assert_eq!(cooldown_key("wire", ""), "wire:");
    }
}
