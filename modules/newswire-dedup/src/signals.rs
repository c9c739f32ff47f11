//! Per-pair similarity signals, each a pure function into [0, 1].
//!
//! A score is 0 when either input is empty; no signal ever produces NaN.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use newswire_common::text::normalize_title;
use newswire_common::Article;

const TITLE_JACCARD_WEIGHT: f64 = 0.4;
const TITLE_DICE_WEIGHT: f64 = 0.6;

const SAME_SOURCE_WEIGHT: f64 = 0.4;
const SAME_CATEGORY_WEIGHT: f64 = 0.3;
const TAG_OVERLAP_WEIGHT: f64 = 0.3;

/// Blend of token Jaccard (0.4) and character-bigram Dice (0.6) over
/// normalized titles.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_title(a);
    let b = normalize_title(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();
    let jaccard = jaccard(&tokens_a, &tokens_b);

    let dice = bigram_dice(&a, &b);

    TITLE_JACCARD_WEIGHT * jaccard + TITLE_DICE_WEIGHT * dice
}

/// Jaccard over lowercased entity-name sets. Empty sets score 0.
pub fn entity_similarity(a: &Article, b: &Article) -> f64 {
    let names_a: HashSet<String> = a.entity_names_lower().into_iter().collect();
    let names_b: HashSet<String> = b.entity_names_lower().into_iter().collect();
    if names_a.is_empty() || names_b.is_empty() {
        return 0.0;
    }
    jaccard(&names_a, &names_b)
}

/// `max(0, 1 − |Δt_hours| / 24)`.
pub fn temporal_proximity(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    let delta_hours = (a - b).num_minutes().abs() as f64 / 60.0;
    (1.0 - delta_hours / 24.0).max(0.0)
}

/// 0.4·[same source] + 0.3·[same category] + 0.3·(tag Jaccard).
pub fn source_alignment(a: &Article, b: &Article) -> f64 {
    let mut score = 0.0;
    if a.source == b.source {
        score += SAME_SOURCE_WEIGHT;
    }
    if a.category == b.category {
        score += SAME_CATEGORY_WEIGHT;
    }
    let tags_a: HashSet<&str> = a.tags.iter().map(String::as_str).collect();
    let tags_b: HashSet<&str> = b.tags.iter().map(String::as_str).collect();
    if !tags_a.is_empty() && !tags_b.is_empty() {
        score += TAG_OVERLAP_WEIGHT * jaccard(&tags_a, &tags_b);
    }
    score
}

fn jaccard<T: std::hash::Hash + Eq>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Dice coefficient over character bigrams drawn from words, so word
/// boundaries don't fabricate bigrams.
fn bigram_dice(a: &str, b: &str) -> f64 {
    let bigrams_a = word_bigrams(a);
    let bigrams_b = word_bigrams(b);
    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return 0.0;
    }
    let intersection = bigrams_a.intersection(&bigrams_b).count();
    2.0 * intersection as f64 / (bigrams_a.len() + bigrams_b.len()) as f64
}

fn word_bigrams(text: &str) -> HashSet<(char, char)> {
    let mut bigrams = HashSet::new();
    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for pair in chars.windows(2) {
            bigrams.insert((pair[0], pair[1]));
        }
    }
    bigrams
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use newswire_common::{Entity, EntityType, Priority};
    use uuid::Uuid;

    fn article(source: &str, category: &str, tags: &[&str]) -> Article {
        Article {
            id: Uuid::new_v4(),
            url: format!("https://{source}.example.com/{}", Uuid::new_v4()),
            title: "Title".to_string(),
            summary: "Summary".to_string(),
            content: None,
            source: source.to_string(),
            source_id: format!("{source}-1"),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            priority: Priority::Medium,
            published_at: Utc::now(),
            fetched_at: Utc::now(),
            author: None,
            image_url: None,
            language: None,
            entities: vec![],
            content_hash: String::new(),
            duplicate_checked: false,
            is_duplicate: false,
            original_article_id: None,
            processed_at: None,
            alert_sent: false,
        }
    }

    fn entity(name: &str) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type: EntityType::Organization,
            confidence: 0.9,
        }
    }

    #[test]
    fn identical_titles_score_one() {
        let s = title_similarity("Acme acquires Beta", "Acme acquires Beta");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn case_and_whitespace_do_not_matter() {
        let s = title_similarity("  ACME Acquires Beta ", "acme acquires beta");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_title_scores_zero() {
        assert_eq!(title_similarity("", "Acme acquires Beta"), 0.0);
        assert_eq!(title_similarity("Acme acquires Beta", ""), 0.0);
        assert_eq!(title_similarity("", ""), 0.0);
    }

    #[test]
    fn paraphrased_titles_score_in_middle_band() {
        let s = title_similarity(
            "Acme to acquire Beta in $2 billion deal",
            "Beta acquired by Acme; deal valued near $2B",
        );
        assert!(s > 0.35 && s < 0.85, "paraphrase scored {s}");
    }

    #[test]
    fn unrelated_titles_score_low() {
        let s = title_similarity(
            "Acme acquires Beta for $2B",
            "Heavy rain expected across the region this weekend",
        );
        assert!(s < 0.3, "unrelated titles scored {s}");
    }

    #[test]
    fn entity_similarity_identical_sets_score_one() {
        let mut a = article("wire", "business", &[]);
        let mut b = article("gazette", "business", &[]);
        a.entities = vec![entity("Acme"), entity("Beta")];
        b.entities = vec![entity("acme"), entity("BETA")];
        assert!((entity_similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn entity_similarity_empty_set_scores_zero() {
        let a = article("wire", "business", &[]);
        let mut b = article("gazette", "business", &[]);
        b.entities = vec![entity("Acme")];
        assert_eq!(entity_similarity(&a, &b), 0.0);
    }

    #[test]
    fn entity_similarity_partial_overlap() {
        let mut a = article("wire", "business", &[]);
        let mut b = article("gazette", "business", &[]);
        a.entities = vec![entity("Acme"), entity("Beta")];
        b.entities = vec![entity("Acme"), entity("Gamma")];
        // intersection 1, union 3
        assert!((entity_similarity(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn temporal_proximity_decays_linearly() {
        let now = Utc::now();
        assert!((temporal_proximity(now, now) - 1.0).abs() < 1e-9);
        let s = temporal_proximity(now, now - Duration::hours(12));
        assert!((s - 0.5).abs() < 1e-3);
        assert_eq!(temporal_proximity(now, now - Duration::hours(30)), 0.0);
    }

    #[test]
    fn source_alignment_full_match() {
        let a = article("wire", "business", &["markets", "m&a"]);
        let b = article("wire", "business", &["markets", "m&a"]);
        assert!((source_alignment(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn source_alignment_category_only() {
        let a = article("wire", "business", &[]);
        let b = article("gazette", "business", &[]);
        assert!((source_alignment(&a, &b) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn source_alignment_disjoint() {
        let a = article("wire", "business", &["markets"]);
        let b = article("gazette", "sports", &["football"]);
        assert_eq!(source_alignment(&a, &b), 0.0);
    }
}
