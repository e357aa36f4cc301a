//! `pdfrag` turns uploaded PDF files into a searchable passage index.
//!
//! Uploaded files are decoded into pages, split into overlapping chunks,
//! embedded, and stored in a vector index. Queries are embedded with the same
//! model and answered with the nearest distinct chunk texts.
//!
//! The pieces are traits so they can be swapped independently:
//!
//! - [`DocumentLoader`]: bytes to pages ([`PdfLoader`], [`TextLoader`], [`AutoLoader`])
//! - [`Chunker`]: pages to chunks ([`FixedSizeChunker`], [`RecursiveChunker`])
//! - [`EmbeddingProvider`]: text to vectors ([`HashEmbedder`], and `MiniLmEmbedder`
//!   behind the `candle` feature)
//! - [`VectorIndex`]: nearest-neighbour search ([`InMemoryVectorIndex`])
//!
//! [`IndexingPipeline`] and [`Retriever`] wire them together, and
//! [`RagSession`] adds the Empty/Ready lifecycle used by the web front end.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod inmemory;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod session;
pub mod vectorstore;

#[cfg(feature = "candle")]
pub mod candle;

pub use chunking::{ChunkStrategy, Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, IndexEntry, Page, SearchResult, SourceDocument};
pub use embedding::{EmbeddingProvider, EmbeddingSpace};
pub use error::{RagError, Result};
pub use hashing::HashEmbedder;
pub use inmemory::InMemoryVectorIndex;
pub use loader::{AutoLoader, DocumentLoader, PdfLoader, TextLoader};
pub use pipeline::{DecodeFailure, IndexReport, IndexingPipeline, IndexingPipelineBuilder};
pub use retriever::{Passage, Retriever};
pub use session::{RagSession, SessionState};
pub use vectorstore::VectorIndex;

#[cfg(feature = "candle")]
pub use candle::MiniLmEmbedder;
