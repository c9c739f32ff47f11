//! Feed fetching and parsing.
//!
//! Retries only transport and 5xx failures, with linear backoff; 4xx is
//! recorded against the feed and not retried. Items come back in feed
//! order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use tracing::{debug, warn};

use newswire_common::{Feed, NewswireError, Result};

const USER_AGENT: &str = concat!("newswire/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 3;

/// Fetch policy shared by every feed, from the `[global]` section of the
/// feeds file.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// One parsed feed item before normalization.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub guid: Option<String>,
    pub summary: String,
    /// `content:encoded` or equivalent full body, when the feed carries it.
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub categories: Vec<String>,
}

#[derive(Debug)]
pub struct FetchedFeed {
    pub feed_title: Option<String>,
    pub items: Vec<RawItem>,
    /// Entries skipped because they had no usable title or link.
    pub skipped_items: usize,
}

pub struct FeedFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
}

impl FeedFetcher {
    pub fn new(policy: FetchPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build feed HTTP client");
        Self { client, policy }
    }

    /// Fetch and parse one feed, retrying transient failures.
    pub async fn fetch(&self, feed: &Feed) -> Result<FetchedFeed> {
        let mut last_error = None;

        for attempt in 1..=self.policy.retry_attempts {
            match self.fetch_once(feed).await {
                Ok(fetched) => return Ok(fetched),
                Err(e @ NewswireError::TransientFetch { .. }) => {
                    warn!(
                        feed = %feed.id,
                        attempt,
                        error = %e,
                        "Transient feed fetch failure"
                    );
                    last_error = Some(e);
                    if attempt < self.policy.retry_attempts {
                        // Linear backoff: delay, 2·delay, ...
                        tokio::time::sleep(self.policy.retry_delay * attempt).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| NewswireError::TransientFetch {
            url: feed.url.clone(),
            reason: "retries exhausted".to_string(),
        }))
    }

    async fn fetch_once(&self, feed: &Feed) -> Result<FetchedFeed> {
        let response = self
            .client
            .get(&feed.url)
            .send()
            .await
            .map_err(|e| NewswireError::TransientFetch {
                url: feed.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(NewswireError::TransientFetch {
                url: feed.url.clone(),
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(NewswireError::MalformedFeed {
                feed: feed.id.clone(),
                reason: format!("HTTP {status}"),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NewswireError::TransientFetch {
                url: feed.url.clone(),
                reason: e.to_string(),
            })?;

        let parsed =
            feed_rs::parser::parse(&bytes[..]).map_err(|e| NewswireError::MalformedFeed {
                feed: feed.id.clone(),
                reason: e.to_string(),
            })?;

        let feed_title = parsed.title.map(|t| t.content);
        let mut items = Vec::new();
        let mut skipped_items = 0usize;
        for entry in parsed.entries {
            match raw_item_from_entry(entry) {
                Some(item) => items.push(item),
                None => skipped_items += 1,
            }
        }

        debug!(
            feed = %feed.id,
            items = items.len(),
            skipped = skipped_items,
            "Feed parsed"
        );

        Ok(FetchedFeed {
            feed_title,
            items,
            skipped_items,
        })
    }
}

/// Map a feed entry to a raw item. Entries must expose at least a title and
/// a link or GUID; custom fields are read opportunistically.
fn raw_item_from_entry(entry: Entry) -> Option<RawItem> {
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let title = entry.title.as_ref().map(|t| t.content.clone())?;
    if title.trim().is_empty() {
        return None;
    }

    let summary = entry
        .summary
        .map(|t| t.content)
        .unwrap_or_default();

    let content = entry.content.and_then(|c| c.body).filter(|b| !b.is_empty());

    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc));

    let author = entry
        .authors
        .first()
        .map(|p| p.name.clone())
        .filter(|n| !n.is_empty());

    let image_url = entry.media.iter().find_map(|m| {
        m.thumbnails
            .first()
            .map(|t| t.image.uri.clone())
            .or_else(|| m.content.first().and_then(|c| c.url.as_ref().map(|u| u.to_string())))
    });

    let categories = entry
        .categories
        .into_iter()
        .map(|c| c.term)
        .filter(|t| !t.is_empty())
        .collect();

    let guid = if entry.id.is_empty() {
        None
    } else {
        Some(entry.id)
    };

    Some(RawItem {
        title,
        link,
        guid,
        summary,
        content,
        published,
        author,
        image_url,
        categories,
    })
}
