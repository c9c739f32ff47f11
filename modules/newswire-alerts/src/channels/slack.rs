//! Slack incoming-webhook channel.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use newswire_common::{Alert, ChannelKind, ChannelResult, Priority};

use super::{failure, success, AlertChannel};

const DELIVERY_TIMEOUT_SECS: u64 = 10;

pub struct SlackChannel {
    webhook_url: String,
    channel: Option<String>,
    http: reqwest::Client,
}

impl SlackChannel {
    pub fn new(webhook_url: String, channel: Option<String>) -> Self {
        Self {
            webhook_url,
            channel,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
                .build()
                .expect("Failed to build Slack HTTP client"),
        }
    }

    fn color(priority: Priority) -> &'static str {
        match priority {
            Priority::High => "danger",
            Priority::Medium => "warning",
            Priority::Low => "good",
        }
    }

    fn payload(&self, alert: &Alert) -> serde_json::Value {
        let mut payload = json!({
            "attachments": [{
                "color": Self::color(alert.priority),
                "title": alert.title,
                "title_link": alert.url,
                "text": alert.summary,
                "fields": [
                    { "title": "Source", "value": alert.source, "short": true },
                    { "title": "Category", "value": alert.category, "short": true },
                    { "title": "Priority", "value": alert.priority.to_string(), "short": true },
                    { "title": "Published", "value": alert.published_at.to_rfc3339(), "short": true },
                ],
            }],
            "unfurl_links": false,
        });
        if let Some(channel) = &self.channel {
            payload["channel"] = json!(channel);
        }
        payload
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    async fn deliver(&self, alert: &Alert) -> ChannelResult {
        let payload = self.payload(alert);
        match self.http.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    success(self.kind(), Some(status.as_u16()))
                } else {
                    warn!(alert_id = %alert.id, status = %status, "Slack returned non-success");
                    failure(self.kind(), Some(status.as_u16()), format!("HTTP {status}"))
                }
            }
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Slack delivery failed");
                failure(self.kind(), None, e.to_string())
            }
        }
    }
}
