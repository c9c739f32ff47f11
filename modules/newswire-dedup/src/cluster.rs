//! Cluster maintenance: creation, growth, merging, centroid recomputation.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use newswire_common::{Article, Cluster, ClusterCentroid, Result};
use newswire_store::Store;

/// Inter-cluster similarity threshold for the offline merge pass.
const CLUSTER_MERGE_THRESHOLD: f64 = 0.8;

/// Recompute aggregate features from the full member list.
pub fn centroid_of(articles: &[&Article]) -> ClusterCentroid {
    if articles.is_empty() {
        return ClusterCentroid {
            avg_word_count: 0.0,
            avg_entity_count: 0.0,
            common_categories: vec![],
            common_tags: vec![],
            source_distribution: BTreeMap::new(),
            mean_published_at: Utc::now(),
        };
    }

    let count = articles.len() as f64;
    let avg_word_count = articles.iter().map(|a| a.word_count() as f64).sum::<f64>() / count;
    let avg_entity_count = articles.iter().map(|a| a.entities.len() as f64).sum::<f64>() / count;

    let mut category_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut tag_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut source_distribution: BTreeMap<String, u32> = BTreeMap::new();
    for article in articles {
        *category_counts.entry(article.category.as_str()).or_insert(0) += 1;
        for tag in &article.tags {
            *tag_counts.entry(tag.as_str()).or_insert(0) += 1;
        }
        *source_distribution.entry(article.source.clone()).or_insert(0) += 1;
    }

    let common_categories = by_frequency(category_counts);
    let common_tags = by_frequency(tag_counts);

    let mean_secs = articles
        .iter()
        .map(|a| a.published_at.timestamp())
        .sum::<i64>()
        / articles.len() as i64;
    let mean_published_at = Utc
        .timestamp_opt(mean_secs, 0)
        .single()
        .unwrap_or_else(Utc::now);

    ClusterCentroid {
        avg_word_count,
        avg_entity_count,
        common_categories,
        common_tags,
        source_distribution,
        mean_published_at,
    }
}

fn by_frequency(counts: BTreeMap<&str, usize>) -> Vec<String> {
    let mut entries: Vec<(&str, usize)> = counts.into_iter().collect();
    entries.sort_by(|(na, ca), (nb, cb)| cb.cmp(ca).then(na.cmp(nb)));
    entries.into_iter().map(|(name, _)| name.to_string()).collect()
}

/// New cluster containing only this article.
pub fn singleton(article: &Article, now: DateTime<Utc>) -> Cluster {
    Cluster {
        id: Uuid::new_v4(),
        article_ids: vec![article.id],
        centroid: centroid_of(&[article]),
        category: article.category.clone(),
        tags: article.tags.clone(),
        sources: vec![article.source.clone()],
        created_at: now,
        updated_at: now,
    }
}

/// Rebuild a cluster's derived fields after membership changed.
pub fn refresh(cluster: &mut Cluster, members: &[&Article], now: DateTime<Utc>) {
    cluster.centroid = centroid_of(members);
    let mut tags: Vec<String> = members
        .iter()
        .flat_map(|a| a.tags.iter().cloned())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    tags.sort();
    cluster.tags = tags;
    let mut sources: Vec<String> = members
        .iter()
        .map(|a| a.source.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    sources.sort();
    cluster.sources = sources;
    cluster.updated_at = now;
}

/// Similarity between two clusters for the offline merge pass. Different
/// categories never merge; same-category pairs score on source and tag
/// overlap.
pub fn inter_cluster_similarity(a: &Cluster, b: &Cluster) -> f64 {
    if a.category != b.category {
        return 0.0;
    }
    let sources_a: HashSet<&str> = a.sources.iter().map(String::as_str).collect();
    let sources_b: HashSet<&str> = b.sources.iter().map(String::as_str).collect();
    let tags_a: HashSet<&str> = a.tags.iter().map(String::as_str).collect();
    let tags_b: HashSet<&str> = b.tags.iter().map(String::as_str).collect();

    0.4 + 0.3 * jaccard(&sources_a, &sources_b) + 0.3 * jaccard(&tags_a, &tags_b)
}

fn jaccard<T: std::hash::Hash + Eq>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Offline maintenance: merge recently-updated same-story clusters whose
/// similarity reaches the threshold. Returns the number of merges applied.
pub async fn run_merge_pass(
    store: &dyn Store,
    updated_since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<u32> {
    let clusters = store.list_clusters_updated_since(updated_since).await?;
    if clusters.len() < 2 {
        return Ok(0);
    }

    let mut absorbed: HashSet<Uuid> = HashSet::new();
    let mut merges = 0u32;

    for i in 0..clusters.len() {
        if absorbed.contains(&clusters[i].id) {
            continue;
        }
        for j in (i + 1)..clusters.len() {
            if absorbed.contains(&clusters[j].id) {
                continue;
            }
            let similarity = inter_cluster_similarity(&clusters[i], &clusters[j]);
            if similarity < CLUSTER_MERGE_THRESHOLD {
                continue;
            }

            // Keep the older cluster, absorb the newer one
            let (keep, drop) = if clusters[i].created_at <= clusters[j].created_at {
                (&clusters[i], &clusters[j])
            } else {
                (&clusters[j], &clusters[i])
            };

            let mut merged = keep.clone();
            for id in &drop.article_ids {
                if !merged.article_ids.contains(id) {
                    merged.article_ids.push(*id);
                }
            }

            let mut members = Vec::new();
            for id in &merged.article_ids {
                match store.find_article(*id).await? {
                    Some(article) => members.push(article),
                    None => warn!(article_id = %id, "Cluster member missing during merge"),
                }
            }
            let refs: Vec<&Article> = members.iter().collect();
            refresh(&mut merged, &refs, now);

            store.update_cluster(&merged).await?;
            store.delete_cluster(drop.id).await?;
            info!(
                kept = %keep.id,
                absorbed_cluster = %drop.id,
                similarity,
                "Merged clusters"
            );
            absorbed.insert(drop.id);
            merges += 1;
        }
    }

    Ok(merges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newswire_common::Priority;

    fn article(source: &str, category: &str, tags: &[&str], words: usize) -> Article {
        Article {
            id: Uuid::new_v4(),
            url: format!("https://{source}.example.com/{}", Uuid::new_v4()),
            title: "Title".to_string(),
            summary: vec!["word"; words].join(" "),
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

    #[test]
    fn singleton_cluster_contains_one_article() {
        let a = article("wire", "business", &["markets"], 10);
        let cluster = singleton(&a, Utc::now());
        assert_eq!(cluster.article_ids, vec![a.id]);
        assert_eq!(cluster.category, "business");
        assert_eq!(cluster.sources, vec!["wire".to_string()]);
        assert!((cluster.centroid.avg_word_count - 10.0).abs() < 1e-9);
    }

    #[test]
    fn centroid_averages_word_and_entity_counts() {
        let a = article("wire", "business", &[], 10);
        let b = article("gazette", "business", &[], 30);
        let centroid = centroid_of(&[&a, &b]);
        assert!((centroid.avg_word_count - 20.0).abs() < 1e-9);
        assert_eq!(centroid.source_distribution.len(), 2);
    }

    #[test]
    fn refresh_unions_tags_and_sources() {
        let a = article("wire", "business", &["markets"], 10);
        let b = article("gazette", "business", &["m&a", "markets"], 10);
        let mut cluster = singleton(&a, Utc::now());
        cluster.article_ids.push(b.id);
        refresh(&mut cluster, &[&a, &b], Utc::now());
        assert_eq!(cluster.tags, vec!["m&a".to_string(), "markets".to_string()]);
        assert_eq!(
            cluster.sources,
            vec!["gazette".to_string(), "wire".to_string()]
        );
    }

    #[test]
    fn different_categories_never_merge() {
        let a = singleton(&article("wire", "business", &["markets"], 10), Utc::now());
        let b = singleton(&article("wire", "sports", &["markets"], 10), Utc::now());
        assert_eq!(inter_cluster_similarity(&a, &b), 0.0);
    }

    #[test]
    fn full_overlap_reaches_merge_threshold() {
        let a = singleton(&article("wire", "business", &["markets"], 10), Utc::now());
        let b = singleton(&article("wire", "business", &["markets"], 10), Utc::now());
        assert!(inter_cluster_similarity(&a, &b) >= CLUSTER_MERGE_THRESHOLD);
    }

    #[test]
    fn disjoint_sources_and_tags_stay_below_threshold() {
        let a = singleton(&article("wire", "business", &["markets"], 10), Utc::now());
        let b = singleton(&article("gazette", "business", &["ipo"], 10), Utc::now());
        assert!(inter_cluster_similarity(&a, &b) < CLUSTER_MERGE_THRESHOLD);
    }
}
