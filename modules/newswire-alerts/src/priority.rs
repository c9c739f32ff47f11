//! Alert priority calculation.

use regex::Regex;
use std::sync::OnceLock;

use newswire_common::{Article, Priority};

const BREAKING_KEYWORDS: &[&str] = &["breaking", "urgent", "alert", "developing"];

const BUSINESS_IMPACT_KEYWORDS: &[&str] =
    &["merger", "acquisition", "ipo", "bankruptcy", "ceo", "funding"];

fn million_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\s?\d+(?:[.,]\d+)*\s?million").expect("Invalid monetary regex")
    })
}

/// Default `medium`; upgraded to `high` by breaking-news or business-impact
/// keywords, monetary magnitude, or the breaking category. Entertainment
/// defaults to `low`.
pub fn calculate_priority(article: &Article) -> Priority {
    let title = article.title.to_lowercase();
    let content = article.body_text().to_lowercase();

    let breaking_title = BREAKING_KEYWORDS.iter().any(|k| title.contains(k));
    let business_impact = BUSINESS_IMPACT_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || content.contains(k));
    let monetary = content.contains("billion") || million_pattern().is_match(&content);

    if breaking_title || business_impact || monetary || article.category == "breaking" {
        return Priority::High;
    }
    if article.category == "entertainment" {
        return Priority::Low;
    }
    Priority::Medium
}
