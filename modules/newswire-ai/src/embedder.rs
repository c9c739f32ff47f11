//! Embedding production with caching and graceful degradation.
//!
//! Lookup order: in-process LRU, then the provider, then a deterministic
//! pseudo-vector derived from text features. The pseudo-vector keeps
//! `semantic_sim` as a cheap surrogate instead of failing the pipeline; it
//! is never good enough to cross the semantic primary threshold on its own.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use tracing::warn;

use crate::provider::OpenAiClient;

const EMBED_CACHE_ENTRIES: usize = 1000;

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Always produces a vector; provider failure degrades to the fallback.
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// The model identifier vectors are attributed to when persisted.
    fn model(&self) -> &str;
}

pub struct EmbeddingService {
    provider: Option<OpenAiClient>,
    model: String,
    dimension: usize,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingService {
    pub fn new(api_key: Option<&str>, model: &str, dimension: usize) -> Self {
        let cache_size = NonZeroUsize::new(EMBED_CACHE_ENTRIES).expect("nonzero cache size");
        Self {
            provider: api_key.map(OpenAiClient::new),
            model: model.to_string(),
            dimension,
            cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    fn cache_get(&self, key: &str) -> Option<Vec<f32>> {
        self.cache
            .lock()
            .expect("embed cache lock poisoned")
            .get(key)
            .cloned()
    }

    fn cache_put(&self, key: String, vector: Vec<f32>) {
        self.cache
            .lock()
            .expect("embed cache lock poisoned")
            .put(key, vector);
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return vec![0.0; self.dimension];
        }
        if let Some(cached) = self.cache_get(text) {
            return cached;
        }

        let vector = match &self.provider {
            Some(client) => match client.embed(&self.model, text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "Embedding provider failed, using pseudo-vector fallback");
                    pseudo_vector(text, self.dimension)
                }
            },
            None => pseudo_vector(text, self.dimension),
        };

        self.cache_put(text.to_string(), vector.clone());
        vector
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Deterministic last-resort surrogate: tokens hashed into buckets, plus a
/// few gross shape features, L2-normalized. Pure function of the text.
pub fn pseudo_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension.max(8)];

    for token in text.to_lowercase().split_whitespace() {
        let bucket = fnv1a(token) as usize % (vector.len() - 4);
        vector[bucket] += 1.0;
    }

    // Shape features in the reserved tail buckets
    let len = vector.len();
    let char_count = text.chars().count() as f32;
    let word_count = text.split_whitespace().count() as f32;
    vector[len - 4] = (char_count / 1000.0).min(1.0);
    vector[len - 3] = (word_count / 200.0).min(1.0);
    vector[len - 2] = text.chars().filter(|c| c.is_numeric()).count() as f32 / char_count.max(1.0);
    vector[len - 1] = text.chars().filter(|c| c.is_uppercase()).count() as f32 / char_count.max(1.0);

    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Cosine similarity between two f32 vectors. Returns 0 for empty or
/// zero-norm inputs, never NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_vector_is_deterministic() {
        let a = pseudo_vector("Acme acquires Beta for $2 billion", 128);
        let b = pseudo_vector("Acme acquires Beta for $2 billion", 128);
        assert_eq!(a, b);
    }

    #[test]
    fn pseudo_vector_is_normalized() {
        let v = pseudo_vector("some text with several words", 128);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn similar_texts_have_higher_pseudo_similarity() {
        let a = pseudo_vector("acme acquires beta in large deal", 256);
        let b = pseudo_vector("beta acquired by acme in a deal", 256);
        let c = pseudo_vector("rain expected over the weekend", 256);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn cosine_of_empty_is_zero_not_nan() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn no_provider_falls_back_to_pseudo_vector() {
        let service = EmbeddingService::new(None, "text-embedding-3-small", 64);
        let v = service.embed("hello world").await;
        assert_eq!(v.len(), 64);
        assert_eq!(v, pseudo_vector("hello world", 64));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let service = EmbeddingService::new(None, "text-embedding-3-small", 16);
        let v = service.embed("   ").await;
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn cache_returns_same_vector() {
        let service = EmbeddingService::new(None, "text-embedding-3-small", 64);
        let first = service.embed("repeated text").await;
        let second = service.embed("repeated text").await;
        assert_eq!(first, second);
    }
}
