//! Similarity primitives shared by the relevance scorer and the overlap
//! detector.

mod embeddings;
mod terms;

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

pub use embeddings::{Embedder, HashEmbedder, build_embedder, cosine_similarity};
pub use terms::{overlap_coefficient, technical_terms};

/// Semantic closeness of two texts in [0, 1].
pub trait Similarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f32;
}

/// Default number of embeddings kept by [`EmbeddingSimilarity`].
pub const MAX_CACHED_EMBEDDINGS: usize = 4096;

/// Cosine similarity of embeddings, clamped to [0, 1]. Embeddings are
/// memoized per text since the same competency text is compared against
/// every responsibility; the least recently used one is dropped at capacity.
pub struct EmbeddingSimilarity {
    embedder: Box<dyn Embedder>,
    cache: Option<Mutex<LruCache<String, Arc<Vec<f32>>>>>,
}

impl EmbeddingSimilarity {
    #[must_use]
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self::with_capacity(embedder, MAX_CACHED_EMBEDDINGS)
    }

    /// A capacity of zero disables memoization.
    #[must_use]
    pub fn with_capacity(embedder: Box<dyn Embedder>, capacity: usize) -> Self {
        Self {
            embedder,
            cache: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }

    fn embedding(&self, text: &str) -> Arc<Vec<f32>> {
        let Some(cache) = &self.cache else {
            return Arc::new(self.embedder.embed(text));
        };
        if let Some(hit) = cache.lock().get(text) {
            return Arc::clone(hit);
        }
        let embedding = Arc::new(self.embedder.embed(text));
        cache.lock().put(text.to_string(), Arc::clone(&embedding));
        embedding
    }
}

impl Default for EmbeddingSimilarity {
    fn default() -> Self {
        Self::new(Box::new(HashEmbedder::default()))
    }
}

impl Similarity for EmbeddingSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f32 {
        let left = self.embedding(a);
        let right = self.embedding(b);
        cosine_similarity(&left, &right).clamp(0.0, 1.0)
    }
}
