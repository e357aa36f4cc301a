//! Embedding provider trait for generating vector embeddings from text.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Identifies the vector space an embedder produces and an index holds.
///
/// Vectors from different spaces are not comparable, so a pipeline or
/// retriever refuses to pair an embedder with an index of another space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    /// Model identifier, e.g. `all-MiniLM-L6-v2`.
    pub model_id: String,
    /// Vector dimensionality.
    pub dimensions: usize,
}

impl EmbeddingSpace {
    /// Create a new embedding space descriptor.
    pub fn new(model_id: impl Into<String>, dimensions: usize) -> Self {
        Self { model_id: model_id.into(), dimensions }
    }

    /// Fail with [`RagError::EmbeddingMismatch`] unless `other` is this space.
    pub fn ensure_matches(&self, other: &EmbeddingSpace) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(RagError::EmbeddingMismatch { expected: self.clone(), actual: other.clone() })
        }
    }
}

impl fmt::Display for EmbeddingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}d)", self.model_id, self.dimensions)
    }
}

/// A provider that generates vector embeddings from text input.
///
/// Implementations must be one-to-one and order-preserving: the `i`-th output
/// vector belongs to the `i`-th input text, and every vector has
/// `space().dimensions` components.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::EmbeddingProvider;
///
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.space().dimensions);
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| {
            RagError::embedding(&self.space().model_id, "embedder returned no vector")
        })
    }

    /// The space this provider embeds into.
    fn space(&self) -> EmbeddingSpace;
}

/// Check that `vectors` is a well-formed answer to a batch of `expected` texts.
pub(crate) fn check_batch(
    space: &EmbeddingSpace,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::embedding(
            &space.model_id,
            format!("embedder returned {} vectors for {expected} inputs", vectors.len()),
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != space.dimensions) {
        return Err(RagError::embedding(
            &space.model_id,
            format!("dimension mismatch: got {} expected {}", bad.len(), space.dimensions),
        ));
    }
    Ok(())
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
