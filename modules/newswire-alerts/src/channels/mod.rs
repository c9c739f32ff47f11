//! Delivery channel backends.

pub mod email;
pub mod slack;
pub mod webhook;

use async_trait::async_trait;

use newswire_common::{Alert, ChannelKind, ChannelResult};

/// One outbound delivery target. Implementations own their HTTP/SMTP
/// clients and report per-delivery results; they never panic the
/// dispatcher.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn deliver(&self, alert: &Alert) -> ChannelResult;
}

pub(crate) fn failure(kind: ChannelKind, status_code: Option<u16>, error: String) -> ChannelResult {
    ChannelResult {
        channel: kind,
        success: false,
        status_code,
        error: Some(error),
    }
}

pub(crate) fn success(kind: ChannelKind, status_code: Option<u16>) -> ChannelResult {
    ChannelResult {
        channel: kind,
        success: true,
        status_code,
        error: None,
    }
}
