//! Indexing pipeline orchestrator.
//!
//! The [`IndexingPipeline`] turns uploaded files into index entries:
//! decode (via a [`DocumentLoader`]) → chunk → embed in batches → insert.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfrag::{IndexingPipeline, RagConfig, InMemoryVectorIndex, HashEmbedder};
//!
//! let embedder = Arc::new(HashEmbedder::default());
//! let index = Arc::new(InMemoryVectorIndex::new(embedder.space()));
//! let pipeline = IndexingPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder)
//!     .vector_index(index)
//!     .build()?;
//!
//! let report = pipeline.run(vec![SourceDocument::new("a.pdf", bytes)]).await?;
//! ```

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, IndexEntry, Page, SourceDocument};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::loader::{AutoLoader, DocumentLoader, PdfLoader};
use crate::vectorstore::VectorIndex;

/// Embedding batches allowed in flight at once. Results are reassembled in
/// input order.
const MAX_IN_FLIGHT_BATCHES: usize = 2;

/// A document that could not be decoded and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeFailure {
    /// The uploaded file name.
    pub source: String,
    /// Why decoding failed.
    pub message: String,
}

/// Outcome of one [`IndexingPipeline::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Number of sources decoded successfully.
    pub documents: usize,
    /// Number of pages decoded across those sources.
    pub pages: usize,
    /// Number of chunks embedded and inserted.
    pub chunks: usize,
    /// Sources that were skipped because they could not be decoded.
    pub failures: Vec<DecodeFailure>,
}

/// The indexing orchestrator.
///
/// Construct one via [`IndexingPipeline::builder()`].
pub struct IndexingPipeline {
    config: RagConfig,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl IndexingPipeline {
    /// Create a new [`IndexingPipelineBuilder`].
    pub fn builder() -> IndexingPipelineBuilder {
        IndexingPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the target index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Decode, chunk, embed and insert every source.
    ///
    /// Sources that fail to decode are logged, listed in the report, and
    /// skipped; the rest of the batch is still indexed.
    ///
    /// # Errors
    ///
    /// Returns the embedding or index error that aborted the run. Nothing
    /// from the run is inserted in that case.
    pub async fn run(
        &self,
        sources: impl IntoIterator<Item = SourceDocument>,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut documents = Vec::new();

        for source in sources {
            let name = source.name.clone();
            match self.decode(source).await {
                Ok(pages) => {
                    report.documents += 1;
                    report.pages += pages.len();
                    documents
                        .extend(pages.into_iter().map(|page| Document::from_page(&name, page)));
                }
                Err(e) => {
                    warn!(document.source = %name, error = %e, "skipping undecodable document");
                    report.failures.push(DecodeFailure { source: name, message: e.to_string() });
                }
            }
        }

        report.chunks = self.index_documents(&documents).await?;
        info!(
            document_count = report.documents,
            page_count = report.pages,
            chunk_count = report.chunks,
            failure_count = report.failures.len(),
            "indexing run completed"
        );
        Ok(report)
    }

    /// Decode one source on the blocking pool.
    ///
    /// A panicking loader is reported as a decode failure of that source.
    async fn decode(&self, source: SourceDocument) -> Result<Vec<Page>> {
        let loader = Arc::clone(&self.loader);
        let name = source.name.clone();
        tokio::task::spawn_blocking(move || loader.decode(&source.name, &source.bytes))
            .await
            .unwrap_or_else(|e| Err(RagError::decode(name, format!("decoder crashed: {e}"))))
    }

    /// Chunk, embed and insert already-decoded documents.
    ///
    /// Returns the number of chunks inserted. Documents with no text add
    /// nothing and leave the index untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the embedder fails or returns
    /// malformed vectors, or the index error if insertion fails.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<usize> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        if chunks.is_empty() {
            info!(chunk_count = 0, "nothing to index");
            return Ok(0);
        }

        let embeddings = self.embed_chunks(&chunks).await.inspect_err(|e| {
            error!(chunk_count = chunks.len(), error = %e, "embedding failed during indexing");
        })?;

        let chunk_count = chunks.len();
        let entries: Vec<IndexEntry> =
            chunks.into_iter().zip(embeddings).map(|(c, e)| IndexEntry::new(c, e)).collect();

        self.index.insert(entries).await.inspect_err(|e| {
            error!(chunk_count, error = %e, "insert failed during indexing");
        })?;

        info!(chunk_count, "indexed chunks");
        Ok(chunk_count)
    }

    /// Embed chunk texts in batches, returning one vector per chunk in order.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let space = self.embedding_provider.space();
        let space = &space;
        let provider = &self.embedding_provider;
        let batches: Vec<Vec<&str>> = chunks
            .chunks(self.config.embed_batch_size)
            .map(|batch| batch.iter().map(|c| c.text.as_str()).collect())
            .collect();

        // Requests are built up front so the stream holds plain futures, which
        // keeps the whole run `Send`.
        let requests: Vec<_> = batches
            .iter()
            .map(|texts| async move {
                let vectors = provider.embed_batch(texts).await?;
                check_batch(space, texts.len(), &vectors)?;
                Ok::<_, RagError>(vectors)
            })
            .collect();

        let embedded: Vec<Vec<Vec<f32>>> =
            stream::iter(requests).buffered(MAX_IN_FLIGHT_BATCHES).try_collect().await?;

        Ok(embedded.into_iter().flatten().collect())
    }
}

/// Builder for constructing an [`IndexingPipeline`].
///
/// `config`, `embedding_provider` and `vector_index` are required. The loader
/// defaults to an [`AutoLoader`] staging under `config.staging_dir`, and the
/// chunker to `config.chunk_strategy`.
#[derive(Default)]
pub struct IndexingPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
}

impl IndexingPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the target vector index.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the [`IndexingPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is invalid, and [`RagError::EmbeddingMismatch`] if the
    /// embedder and index disagree on the embedding space.
    pub fn build(self) -> Result<IndexingPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let index = self
            .index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        index.space().ensure_matches(&embedding_provider.space())?;

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => config.chunk_strategy.build(config.chunk_size, config.chunk_overlap)?,
        };
        let loader = self.loader.unwrap_or_else(|| {
            let pdf = match &config.staging_dir {
                Some(dir) => PdfLoader::new().with_staging_dir(dir),
                None => PdfLoader::new(),
            };
            Arc::new(AutoLoader::new(pdf))
        });

        Ok(IndexingPipeline { config, loader, chunker, embedding_provider, index })
    }
}
