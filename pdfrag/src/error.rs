//! Error types for the `pdfrag` crate.

use thiserror::Error;

use crate::embedding::EmbeddingSpace;

/// Errors that can occur while indexing documents or answering queries.
#[derive(Debug, Error)]
pub enum RagError {
    /// A document could not be decoded into text.
    ///
    /// The indexing pipeline records these per document and keeps going.
    #[error("Decode error ({source_name}): {message}")]
    Decode {
        /// The file name or identifier of the offending document.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedder failed or returned malformed output.
    #[error("Embedding error ({model}): {message}")]
    Embedding {
        /// The embedding model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedder and the vector index disagree on the embedding space.
    #[error("Embedding space mismatch: index holds {expected}, embedder produces {actual}")]
    EmbeddingMismatch {
        /// The space the index was built for.
        expected: EmbeddingSpace,
        /// The space of the embedder being used.
        actual: EmbeddingSpace,
    },

    /// The vector index is unreachable, corrupt, or rejected an operation.
    #[error("Index error ({backend}): {message}")]
    Index {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O error from staging or snapshot files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn decode(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode { source_name: source_name.into(), message: message.to_string() }
    }

    pub(crate) fn embedding(model: impl Into<String>, message: impl ToString) -> Self {
        Self::Embedding { model: model.into(), message: message.to_string() }
    }

    pub(crate) fn index(backend: impl Into<String>, message: impl ToString) -> Self {
        Self::Index { backend: backend.into(), message: message.to_string() }
    }

    /// Whether this error belongs to the embedding family (including space mismatches).
    pub fn is_embedding_error(&self) -> bool {
        matches!(self, Self::Embedding { .. } | Self::EmbeddingMismatch { .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
