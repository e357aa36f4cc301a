//! Vector index trait for storing and searching embedded chunks.

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchResult};
use crate::embedding::EmbeddingSpace;
use crate::error::Result;

/// A storage backend for embedded chunks with similarity search.
///
/// An index belongs to exactly one [`EmbeddingSpace`], fixed at construction.
/// Entries are only ever inserted; to start over, build a new index.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(embedder.space());
/// index.insert(entries).await?;
/// let hits = index.search(&query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The embedding space of every vector in this index.
    fn space(&self) -> &EmbeddingSpace;

    /// Insert entries. An entry whose id already exists replaces the old one.
    ///
    /// Every embedding must have `space().dimensions` components; otherwise
    /// nothing is inserted and an embedding error is returned.
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Search for the `top_k` entries most similar to `embedding`.
    ///
    /// Returns results ordered by descending similarity score. An empty index
    /// yields an empty list.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize>;

    /// Whether the index holds no entries.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
