//! Deterministic feature-hashing embedder.
//!
//! [`HashEmbedder`] needs no model files: every lowercased word is hashed into
//! one of `dimensions` buckets and the bucket counts are L2-normalized. Texts
//! sharing vocabulary end up close under cosine similarity, which is enough for
//! offline use and for tests.

use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use crate::embedding::{EmbeddingProvider, EmbeddingSpace, l2_normalize};
use crate::error::{RagError, Result};

/// Dimension used when none is configured.
pub const DEFAULT_HASH_DIMENSIONS: usize = 384;

/// Bag-of-words embedder backed by xxHash64 feature hashing.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    seed: u64,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of `dimensions` components.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("hash embedder dimensions must be non-zero".to_string()));
        }
        Ok(Self { dimensions, seed: 0 })
    }

    /// Use a different hash seed. Different seeds give unrelated spaces.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let mut hasher = XxHash64::with_seed(self.seed);
            hasher.write(word.to_lowercase().as_bytes());
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            // The top bit picks the sign so unrelated words tend to cancel out.
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: DEFAULT_HASH_DIMENSIONS, seed: 0 }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn space(&self) -> EmbeddingSpace {
        let model_id = if self.seed == 0 {
            format!("hash-bow-{}", self.dimensions)
        } else {
            format!("hash-bow-{}-s{}", self.dimensions, self.seed)
        };
        EmbeddingSpace::new(model_id, self.dimensions)
    }
}
