//! SMTP email channel.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use newswire_common::{Alert, ChannelKind, ChannelResult, SmtpConfig};

use super::{failure, success, AlertChannel};

pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: Vec<String>,
}

impl EmailChannel {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
            to: config.to.clone(),
        })
    }

    fn build_message(&self, alert: &Alert) -> anyhow::Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .subject(format!(
                "[{}] {}",
                alert.priority.to_string().to_uppercase(),
                alert.title
            ));
        for recipient in &self.to {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }
        let body = format!(
            "{}\n\n{}\n\nSource: {}\nCategory: {}\nPublished: {}\n{}",
            alert.title,
            alert.summary,
            alert.source,
            alert.category,
            alert.published_at.to_rfc3339(),
            alert.url,
        );
        Ok(builder.body(body)?)
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, alert: &Alert) -> ChannelResult {
        let message = match self.build_message(alert) {
            Ok(m) => m,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Failed to build alert email");
                return failure(self.kind(), None, e.to_string());
            }
        };
        match self.transport.send(message).await {
            Ok(_) => success(self.kind(), None),
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "Email delivery failed");
                failure(self.kind(), None, e.to_string())
            }
        }
    }
}
