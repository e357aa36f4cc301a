//! The Empty/Ready session state machine.
//!
//! A [`RagSession`] owns the current retriever, if any. Each call to
//! [`RagSession::index`] builds a fresh index from the uploaded files and,
//! when that produced at least one chunk, swaps it in. Queries before the first
//! successful run return no passages.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::RagConfig;
use crate::document::SourceDocument;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::inmemory::InMemoryVectorIndex;
use crate::loader::DocumentLoader;
use crate::pipeline::{IndexReport, IndexingPipeline};
use crate::retriever::{Passage, Retriever};
use crate::vectorstore::VectorIndex;

/// Macro-state of a [`RagSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No index has been built; queries return nothing.
    Empty,
    /// An index with at least one chunk is available.
    Ready,
}

/// One user's indexing and query context.
pub struct RagSession {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    loader: Option<Arc<dyn DocumentLoader>>,
    retriever: RwLock<Option<Retriever>>,
}

impl RagSession {
    /// Create an Empty session.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`](crate::RagError::Config) if `config` is invalid.
    pub fn new(config: RagConfig, embedding_provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, embedding_provider, loader: None, retriever: RwLock::new(None) })
    }

    /// Create a session, resuming from the snapshot in `config.storage_dir`
    /// when one exists and is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingMismatch`](crate::RagError::EmbeddingMismatch)
    /// if the snapshot was built with another embedding model, or an index
    /// error if it cannot be read.
    pub async fn open(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let session = Self::new(config, embedding_provider)?;
        if let Some(dir) = &session.config.storage_dir {
            let index = InMemoryVectorIndex::open(dir, session.embedding_provider.space()).await?;
            let entry_count = index.len().await?;
            if entry_count > 0 {
                let retriever = Retriever::new(
                    Arc::clone(&session.embedding_provider),
                    Arc::new(index),
                    session.config.top_k,
                )?;
                *session.retriever.write().await = Some(retriever);
                info!(entry_count, "resumed session from stored index");
            }
        }
        Ok(session)
    }

    /// Use `loader` instead of the default auto-detecting loader.
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The current macro-state.
    pub async fn state(&self) -> SessionState {
        if self.retriever.read().await.is_some() {
            SessionState::Ready
        } else {
            SessionState::Empty
        }
    }

    /// Number of entries in the current index (0 when Empty).
    pub async fn entry_count(&self) -> Result<usize> {
        match self.retriever.read().await.as_ref() {
            Some(retriever) => retriever.index().len().await,
            None => Ok(0),
        }
    }

    /// Build a fresh index from `sources` and make it current.
    ///
    /// The session only moves to (or stays in) Ready with the new index if the
    /// run inserted at least one chunk. Otherwise, and on error, the previous
    /// index remains in place.
    ///
    /// # Errors
    ///
    /// Returns the embedding or index error that aborted the run. Decode
    /// failures are reported in the [`IndexReport`] instead.
    pub async fn index(&self, sources: Vec<SourceDocument>) -> Result<IndexReport> {
        let space = self.embedding_provider.space();
        let index: Arc<dyn VectorIndex> = match &self.config.storage_dir {
            Some(dir) => Arc::new(InMemoryVectorIndex::create(dir, space).await?),
            None => Arc::new(InMemoryVectorIndex::new(space)),
        };

        let mut builder = IndexingPipeline::builder()
            .config(self.config.clone())
            .embedding_provider(Arc::clone(&self.embedding_provider))
            .vector_index(Arc::clone(&index));
        if let Some(loader) = &self.loader {
            builder = builder.loader(Arc::clone(loader));
        }
        let report = builder.build()?.run(sources).await?;

        if report.chunks > 0 {
            let retriever =
                Retriever::new(Arc::clone(&self.embedding_provider), index, self.config.top_k)?;
            *self.retriever.write().await = Some(retriever);
        }
        Ok(report)
    }

    /// Answer `query` with up to `config.top_k` distinct passages.
    ///
    /// Returns an empty list while the session is Empty.
    pub async fn query(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.query_passages(query, None).await?.into_iter().map(|p| p.text).collect())
    }

    /// Answer `query` with up to `k` (default `config.top_k`) distinct passages.
    pub async fn query_passages(&self, query: &str, k: Option<usize>) -> Result<Vec<Passage>> {
        let Some(retriever) = self.retriever.read().await.clone() else {
            return Ok(Vec::new());
        };
        retriever.retrieve_passages(query, k.unwrap_or(self.config.top_k)).await
    }
}
