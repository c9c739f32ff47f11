//! Pairwise TF-IDF cosine similarity over stopword-filtered token streams.
//!
//! The vocabulary is built from the two documents under comparison, not
//! from a global corpus, so scores are comparable across pairs regardless
//! of what else has been ingested. Vocabulary size and per-document token
//! count are bounded by explicit configuration.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TfIdfConfig {
    pub max_vocabulary: usize,
    pub max_doc_tokens: usize,
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        Self {
            max_vocabulary: 2000,
            max_doc_tokens: 500,
        }
    }
}

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "are", "as", "at", "be", "been", "but",
    "by", "can", "could", "did", "do", "for", "from", "had", "has", "have", "he", "her", "his",
    "how", "in", "into", "is", "it", "its", "just", "more", "most", "new", "no", "not", "of",
    "on", "one", "or", "our", "out", "over", "said", "she", "so", "some", "than", "that", "the",
    "their", "them", "there", "they", "this", "to", "up", "was", "we", "were", "what", "when",
    "which", "who", "will", "with", "would", "you",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

fn tokenize(text: &str, max_tokens: usize) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !is_stopword(t))
        .take(max_tokens)
        .map(str::to_string)
        .collect()
}

/// TF-IDF cosine similarity for one document pair. Returns 0 when either
/// document has no usable tokens; never NaN.
pub fn pairwise_cosine(a: &str, b: &str, config: &TfIdfConfig) -> f64 {
    let tokens_a = tokenize(a, config.max_doc_tokens);
    let tokens_b = tokenize(b, config.max_doc_tokens);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let counts_a = term_counts(&tokens_a);
    let counts_b = term_counts(&tokens_b);

    // Pairwise vocabulary, capped by combined frequency
    let mut vocabulary: Vec<(&str, usize)> = {
        let mut combined: HashMap<&str, usize> = HashMap::new();
        for (term, count) in counts_a.iter().chain(counts_b.iter()) {
            *combined.entry(term.as_str()).or_insert(0) += count;
        }
        combined.into_iter().collect()
    };
    vocabulary.sort_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then(ta.cmp(tb)));
    vocabulary.truncate(config.max_vocabulary);

    let len_a = tokens_a.len() as f64;
    let len_b = tokens_b.len() as f64;

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (term, _) in &vocabulary {
        let tf_a = counts_a.get(*term).copied().unwrap_or(0) as f64 / len_a;
        let tf_b = counts_b.get(*term).copied().unwrap_or(0) as f64 / len_b;
        let df = (tf_a > 0.0) as usize + (tf_b > 0.0) as usize;
        // Smoothed IDF over the two-document corpus
        let idf = ((1.0 + 2.0) / (1.0 + df as f64)).ln() + 1.0;
        let wa = tf_a * idf;
        let wb = tf_b * idf;
        dot += wa * wb;
        norm_a += wa * wa;
        norm_b += wb * wb;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn term_counts(tokens: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}
