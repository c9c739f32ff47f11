//! Typed errors for the ingestion, dedup, and alerting pipeline.

use thiserror::Error;

/// Pipeline error taxonomy. Item-level errors stay within the item's stage;
/// only `Configuration` (at startup) and persistent store loss terminate
/// anything larger than a batch.
#[derive(Debug, Error)]
pub enum NewswireError {
    /// Network, DNS, or 5xx failure: retried within the stage.
    #[error("transient fetch error for {url}: {reason}")]
    TransientFetch { url: String, reason: String },

    /// Feed body could not be parsed at all.
    #[error("malformed feed {feed}: {reason}")]
    MalformedFeed { feed: String, reason: String },

    /// One item was unusable; the rest of the feed continues.
    #[error("malformed item in {feed}: {reason}")]
    MalformedItem { feed: String, reason: String },

    /// Store read/write failure, subject to the stage's retry policy.
    #[error("store error: {0}")]
    Store(String),

    /// Embedding or LLM provider failure; downgraded to fallback.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Per-channel delivery failure, recorded in the alert's result vector.
    #[error("channel delivery failed on {channel}: {reason}")]
    ChannelDelivery { channel: String, reason: String },

    /// Missing or out-of-range configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl NewswireError {
    /// Whether a stage retry policy may re-attempt after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NewswireError::TransientFetch { .. }
                | NewswireError::Store(_)
                | NewswireError::ProviderUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NewswireError>;
