//! Generic JSON webhook channel.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use newswire_common::{Alert, ChannelKind, ChannelResult};

use super::{failure, success, AlertChannel};

const DELIVERY_TIMEOUT_SECS: u64 = 10;
/// Transport and 5xx failures are retried this many times in total.
const DELIVERY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 300;
const MAX_PAYLOAD_ENTITIES: usize = 10;

pub struct WebhookChannel {
    url: String,
    http: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
                .build()
                .expect("Failed to build webhook HTTP client"),
        }
    }

    fn payload(alert: &Alert) -> serde_json::Value {
        let entities: Vec<_> = alert.entities.iter().take(MAX_PAYLOAD_ENTITIES).collect();
        json!({
            "type": "news_alert",
            "alert": {
                "id": alert.id,
                "title": alert.title,
                "summary": alert.summary,
                "source": alert.source,
                "category": alert.category,
                "priority": alert.priority,
                "url": alert.url,
                "publishedAt": alert.published_at.to_rfc3339(),
                "entities": entities,
                "tags": alert.tags,
                "createdAt": alert.created_at.to_rfc3339(),
            },
            "metadata": {
                "system": "newswire",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
        })
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn deliver(&self, alert: &Alert) -> ChannelResult {
        let payload = Self::payload(alert);
        let mut last = failure(self.kind(), None, "no attempt made".to_string());

        for attempt in 1..=DELIVERY_ATTEMPTS {
            match self.http.post(&self.url).json(&payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return success(self.kind(), Some(status.as_u16()));
                    }
                    warn!(
                        alert_id = %alert.id,
                        status = %status,
                        attempt,
                        "Webhook returned non-success"
                    );
                    last = failure(
                        self.kind(),
                        Some(status.as_u16()),
                        format!("HTTP {status}"),
                    );
                    // Only server errors are worth another attempt
                    if !status.is_server_error() {
                        return last;
                    }
                }
                Err(e) => {
                    warn!(alert_id = %alert.id, attempt, error = %e, "Webhook delivery failed");
                    last = failure(self.kind(), None, e.to_string());
                }
            }
            if attempt < DELIVERY_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use newswire_common::{AlertStatus, Entity, EntityType, Priority};
    use uuid::Uuid;

    fn alert_with_entities(count: usize) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            article_id: Uuid::new_v4(),
            title: "Acme acquires Beta".to_string(),
            summary: "Deal announced".to_string(),
            source: "wire".to_string(),
            category: "business".to_string(),
            priority: Priority::High,
            url: "https://example.com/a".to_string(),
            published_at: Utc::now(),
            entities: (0..count)
                .map(|i| Entity {
                    name: format!("Entity{i}"),
                    entity_type: EntityType::Organization,
                    confidence: 0.8,
                })
                .collect(),
            tags: vec!["markets".to_string()],
            channels: vec![ChannelKind::Webhook],
            status: AlertStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            results: vec![],
            resend_count: 0,
        }
    }

    #[test]
    fn payload_has_expected_shape() {
        let alert = alert_with_entities(2);
        let payload = WebhookChannel::payload(&alert);
        assert_eq!(payload["type"], "news_alert");
        assert_eq!(payload["alert"]["priority"], "high");
        assert!(payload["alert"]["publishedAt"].is_string());
        assert!(payload["alert"]["createdAt"].is_string());
        assert_eq!(payload["metadata"]["system"], "newswire");
        assert_eq!(payload["alert"]["entities"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn payload_caps_entities_at_ten() {
        let alert = alert_with_entities(25);
        let payload = WebhookChannel::payload(&alert);
        assert_eq!(payload["alert"]["entities"].as_array().unwrap().len(), 10);
    }
}
