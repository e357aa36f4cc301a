//! Data types for uploaded sources, decoded documents, chunks, and index entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the originating file name.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the 1-based page number.
pub const META_PAGE: &str = "page";
/// Metadata key holding the chunk's position within its document.
pub const META_CHUNK_INDEX: &str = "chunk_index";

/// An uploaded file awaiting decoding: a name plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// File name or other identifier supplied by the uploader.
    pub name: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Create a new source document.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }
}

/// One page of text produced by a [`DocumentLoader`](crate::loader::DocumentLoader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Extracted page text.
    pub text: String,
    /// 1-based page number.
    pub number: usize,
}

/// A decoded unit of text with its source metadata.
///
/// The pipeline creates one `Document` per decoded page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier, `{source}#{page}`.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata (`source`, `page`).
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Build the document for one page of a source file.
    pub fn from_page(source: &str, page: Page) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE.to_string(), source.to_string());
        metadata.insert(META_PAGE.to_string(), page.number.to_string());
        Self { id: format!("{source}#{}", page.number), text: page.text, metadata }
    }
}

/// A contiguous slice of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier, `{document_id}_{chunk_index}`.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Parent document metadata plus `chunk_index`.
    pub metadata: BTreeMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A chunk paired with its embedding, as stored in a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// Content-derived identifier. Inserting an entry with an existing id replaces it.
    pub id: String,
    /// The chunk text returned to callers.
    pub text: String,
    /// Metadata inherited from the chunk.
    pub metadata: BTreeMap<String, String>,
    /// The embedding vector for `text`.
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    ///
    /// The id hashes the source, page, chunk index and text, so indexing the
    /// same file twice yields the same ids.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for key in [META_SOURCE, META_PAGE, META_CHUNK_INDEX] {
            hasher.update(chunk.metadata.get(key).map(String::as_str).unwrap_or("").as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(chunk.text.as_bytes());
        Self {
            id: hasher.finalize().to_hex().to_string(),
            text: chunk.text,
            metadata: chunk.metadata,
            embedding,
        }
    }

    /// The originating file name, if recorded.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    /// The 1-based page number, if recorded.
    pub fn page(&self) -> Option<usize> {
        self.metadata.get(META_PAGE).and_then(|p| p.parse().ok())
    }
}

/// A retrieved [`IndexEntry`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved entry.
    pub entry: IndexEntry,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
