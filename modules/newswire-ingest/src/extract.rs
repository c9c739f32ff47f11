//! Optional full-page content extraction.
//!
//! Fetches the item URL and pulls the main article text out of the HTML by
//! selector heuristics, falling back to the densest text block. Extraction
//! failures are non-fatal; the item keeps its feed-provided summary.

use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("newswire/", env!("CARGO_PKG_VERSION"));
const EXTRACT_TIMEOUT_SECS: u64 = 30;
/// Below this many characters the extraction is considered a miss.
const MIN_CONTENT_CHARS: usize = 200;

/// Containers likely to hold the article body, in preference order.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    "div.article-body",
    "div.post-content",
    "div.entry-content",
    "div.story-body",
    "div#content",
];

pub struct PageExtractor {
    client: reqwest::Client,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(EXTRACT_TIMEOUT_SECS))
                .redirect(reqwest::redirect::Policy::limited(3))
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to build page HTTP client"),
        }
    }

    /// Fetch a page and extract its main text. `None` means the page gave
    /// us nothing usable, so the caller keeps the feed summary.
    pub async fn extract(&self, url: &str) -> Option<String> {
        match self.fetch_html(url).await {
            Ok(html) => {
                let text = extract_main_content(&html);
                if text.is_none() {
                    debug!(url, "No extractable main content");
                }
                text
            }
            Err(e) => {
                warn!(url, error = %e, "Full-page fetch failed");
                None
            }
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("page request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }
        response.text().await.context("page body read failed")
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the main article text out of parsed HTML. Paragraph-level
/// selection inside candidate containers skips scripts, navigation, and ad
/// markup; the fallback picks the parent with the largest total paragraph
/// text.
pub fn extract_main_content(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let paragraph = Selector::parse("p").ok()?;

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let mut best: Option<String> = None;
        for container in document.select(&selector) {
            let text = join_paragraphs(container.select(&paragraph));
            if text.chars().count() >= MIN_CONTENT_CHARS
                && best.as_ref().is_none_or(|b| text.len() > b.len())
            {
                best = Some(text);
            }
        }
        if best.is_some() {
            return best;
        }
    }

    // Fallback: the densest run of paragraphs anywhere in the document
    largest_text_block(&document, &paragraph)
}

fn join_paragraphs<'a, I>(paragraphs: I) -> String
where
    I: Iterator<Item = scraper::ElementRef<'a>>,
{
    let mut parts = Vec::new();
    for p in paragraphs {
        let text: String = p.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join("\n\n")
}

fn largest_text_block(document: &Html, paragraph: &Selector) -> Option<String> {
    use std::collections::HashMap;

    let mut by_parent: HashMap<ego_tree::NodeId, Vec<String>> = HashMap::new();
    for p in document.select(paragraph) {
        let Some(parent) = p.parent() else { continue };
        let text: String = p.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            by_parent.entry(parent.id()).or_default().push(text);
        }
    }

    let best = by_parent
        .into_values()
        .map(|parts| parts.join("\n\n"))
        .max_by_key(|text| text.chars().count())?;

    (best.chars().count() >= MIN_CONTENT_CHARS).then_some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(n: usize) -> String {
        format!("<p>{}</p>", vec!["article body sentence here"; n].join(" "))
    }

    #[test]
    fn prefers_article_container() {
        let html = format!(
            "<html><body>\
             <nav><p>Menu item one menu item two menu item three</p></nav>\
             <article>{}{}</article>\
             <footer><p>Copyright notice</p></footer>\
             </body></html>",
            para(5),
            para(5)
        );
        let text = extract_main_content(&html).unwrap();
        assert!(text.contains("article body sentence"));
        assert!(!text.contains("Menu item"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn scripts_do_not_leak_into_content() {
        let html = format!(
            "<html><body><article><script>var tracking = true;</script>{}</article></body></html>",
            para(10)
        );
        let text = extract_main_content(&html).unwrap();
        assert!(!text.contains("tracking"));
    }

    #[test]
    fn falls_back_to_largest_text_block() {
        let html = format!(
            "<html><body>\
             <div class=\"sidebar\"><p>short promo</p></div>\
             <div class=\"unmarked\">{}{}{}</div>\
             </body></html>",
            para(4),
            para(4),
            para(4)
        );
        let text = extract_main_content(&html).unwrap();
        assert!(text.contains("article body sentence"));
        assert!(!text.contains("short promo"));
    }

    #[test]
    fn too_little_text_yields_none() {
        let html = "<html><body><article><p>tiny</p></article></body></html>";
        assert!(extract_main_content(html).is_none());
    }
}
