//! Query-time retrieval: embed the query, search, drop duplicate passages.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::vectorstore::VectorIndex;

/// A deduplicated retrieval hit with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    /// The chunk text.
    pub text: String,
    /// Cosine similarity to the query.
    pub score: f32,
    /// The originating file name, if known.
    pub source: Option<String>,
    /// The 1-based page number, if known.
    pub page: Option<usize>,
}

impl From<SearchResult> for Passage {
    fn from(result: SearchResult) -> Self {
        Self {
            source: result.entry.source().map(str::to_string),
            page: result.entry.page(),
            text: result.entry.text,
            score: result.score,
        }
    }
}

/// Keep the first occurrence of each distinct text, in rank order.
///
/// Texts are compared byte for byte; near-duplicates are kept.
pub fn dedup_by_text(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results.into_iter().filter(|r| seen.insert(r.entry.text.clone())).collect()
}

/// Answers queries against a populated [`VectorIndex`].
///
/// The retriever must embed queries with the same model that built the index;
/// [`Retriever::new`] rejects mismatched pairs.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    default_k: usize,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("space", self.index.space())
            .field("default_k", &self.default_k)
            .finish()
    }
}

impl Retriever {
    /// Create a retriever returning up to `default_k` passages per query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingMismatch`](crate::RagError::EmbeddingMismatch)
    /// if the provider's embedding space differs from the index's.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        default_k: usize,
    ) -> Result<Self> {
        index.space().ensure_matches(&embedding_provider.space())?;
        Ok(Self { embedding_provider, index, default_k })
    }

    /// The index queries are answered from.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// The `k` used by [`Retriever::retrieve`].
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Return the texts of the `default_k` nearest chunks, duplicates removed.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        self.retrieve_k(query, self.default_k).await
    }

    /// Return the texts of the `k` nearest chunks, duplicates removed.
    ///
    /// The result has at most `k` entries and never repeats a text. An empty
    /// index gives an empty list.
    ///
    /// # Errors
    ///
    /// Returns the embedding or index error that failed the query.
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self.retrieve_passages(query, k).await?.into_iter().map(|p| p.text).collect())
    }

    /// Like [`Retriever::retrieve_k`] but keeps scores and source metadata.
    pub async fn retrieve_passages(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        if k == 0 || self.index.is_empty().await? {
            debug!(k, "query against empty index or with k = 0");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        let results = self.index.search(&query_embedding, k).await.inspect_err(|e| {
            error!(error = %e, "vector index search failed");
        })?;

        let hit_count = results.len();
        let passages: Vec<Passage> =
            dedup_by_text(results).into_iter().map(Passage::from).collect();
        info!(k, hit_count, result_count = passages.len(), "query completed");
        Ok(passages)
    }
}
