//! Hash embeddings
//!
//! FNV-1a feature hashing over tokens and bigrams. No model weights,
//! fully deterministic across runs and platforms.

use crate::config::EmbeddingConfig;
use crate::error::{CmError, Result};

/// Pluggable embedding backend interface
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dims(&self) -> usize;
}

/// Build an embedder from the `[embedding]` config section.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    let backend = config.backend.trim().to_lowercase();
    let dims = config.dims as usize;
    if dims == 0 {
        return Err(CmError::Config(
            "embedding.dims must be greater than 0".to_string(),
        ));
    }

    match backend.as_str() {
        "" | "hash" => Ok(Box::new(HashEmbedder::new(dims))),
        other => Err(CmError::Config(format!(
            "unknown embedding backend: {other}"
        ))),
    }
}

/// Hash embedder using FNV-1a
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl HashEmbedder {
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Embed text into an L2-normalized vector. Text without usable
    /// tokens embeds to the zero vector.
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        if self.dim == 0 {
            return Vec::new();
        }

        let tokens = tokenize(text);
        let mut embedding = vec![0.0; self.dim];

        if tokens.is_empty() {
            return embedding;
        }

        for token in &tokens {
            accumulate(&mut embedding, token, 1.0);
        }

        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate(&mut embedding, &bigram, 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        Self::embed(self, text)
    }

    fn dims(&self) -> usize {
        self.dim
    }
}

/// Cosine similarity in [-1, 1]; 0 for mismatched or zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| token.len() >= 2)
        .map(str::to_string)
        .collect()
}

fn accumulate(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a_hash(token.as_bytes());
    let len = embedding.len();

    for i in 0..len {
        let dim_hash = fnv1a_hash_with_salt(token_hash, i as u64);
        let sign = if dim_hash & 1 == 0 { weight } else { -weight };
        let dim = ((dim_hash >> 1) as usize) % len;
        embedding[dim] += sign;
    }
}

fn fnv1a_hash_with_salt(seed: u64, salt: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&salt.to_le_bytes());
    fnv1a_hash(&bytes)
}

fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}
