//! Alert admission quality scoring.

use chrono::{DateTime, Duration, Utc};

use newswire_common::Article;

/// Minimum integer quality score for admission.
pub const QUALITY_THRESHOLD: i32 = 3;

/// Categories that signal higher news value.
const PRIORITY_CATEGORIES: &[&str] = &["business", "technology", "breaking"];

/// Integer quality score: content length (≥500 chars ⇒ +2, ≥200 ⇒ +1),
/// has entities (+1), priority category (+2), trusted source (+1),
/// age under 2 hours (+1).
pub fn quality_score(article: &Article, trusted_sources: &[String], now: DateTime<Utc>) -> i32 {
    let mut score = 0;

    let content_chars = article.body_text().chars().count();
    if content_chars >= 500 {
        score += 2;
    } else if content_chars >= 200 {
        score += 1;
    }

    if !article.entities.is_empty() {
        score += 1;
    }

    if PRIORITY_CATEGORIES.contains(&article.category.as_str()) {
        score += 2;
    }

    if trusted_sources
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&article.source))
    {
        score += 1;
    }

    if now - article.published_at < Duration::hours(2) {
        score += 1;
    }

    score
}

pub fn admit(article: &Article, trusted_sources: &[String], now: DateTime<Utc>) -> bool {
    quality_score(article, trusted_sources, now) >= QUALITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use newswire_common::{Entity, EntityType, Priority};
    use uuid::Uuid;

    fn article(category: &str, content_chars: usize, age_minutes: i64) -> Article {
        let now = Utc::now();
        Article {
            id: Uuid::new_v4(),
            url: "https://example.com/a".to_string(),
            title: "Title".to_string(),
            summary: "s".to_string(),
            content: Some("x".repeat(content_chars)),
            source: "wire".to_string(),
            source_id: "wire-1".to_string(),
            category: category.to_string(),
            tags: vec![],
            priority: Priority::Medium,
            published_at: now - Duration::minutes(age_minutes),
            fetched_at: now,
            author: None,
            image_url: None,
            language: None,
            entities: vec![],
            content_hash: String::new(),
            duplicate_checked: true,
            is_duplicate: false,
            original_article_id: None,
            processed_at: Some(now),
            alert_sent: false,
        }
    }

    #[test]
    fn rich_fresh_business_article_admitted() {
        let now = Utc::now();
        let mut a = article("business", 600, 30);
        a.entities = vec![Entity {
            name: "Acme".to_string(),
            entity_type: EntityType::Organization,
            confidence: 0.9,
        }];
        // 2 (length) + 1 (entities) + 2 (category) + 1 (fresh) = 6
        assert_eq!(quality_score(&a, &[], now), 6);
        assert!(admit(&a, &[], now));
    }

    #[test]
    fn thin_stale_article_rejected() {
        let now = Utc::now();
        let a = article("sports", 100, 300);
        assert_eq!(quality_score(&a, &[], now), 0);
        assert!(!admit(&a, &[], now));
    }

    #[test]
    fn medium_length_counts_one() {
        let now = Utc::now();
        let a = article("sports", 250, 300);
        assert_eq!(quality_score(&a, &[], now), 1);
    }

    #[test]
    fn trusted_source_adds_one() {
        let now = Utc::now();
        let a = article("sports", 100, 300);
        let trusted = vec!["Wire".to_string()];
        assert_eq!(quality_score(&a, &trusted, now), 1);
    }

    #[test]
    fn borderline_needs_three_points() {
        let now = Utc::now();
        // fresh (1) + 200-char content (1) = 2 → rejected
        let a = article("sports", 250, 30);
        assert_eq!(quality_score(&a, &[], now), 2);
        assert!(!admit(&a, &[], now));

        // add priority category → 4 → admitted
        let b = article("technology", 250, 30);
        assert!(admit(&b, &[], now));
    }
}
