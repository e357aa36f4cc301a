//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: hard character windows with configurable overlap
//! - [`RecursiveChunker`]: the same windows, but each cut is pulled back to the
//!   latest paragraph, line, sentence, or word break inside the window
//!
//! Both strategies measure sizes in characters (Unicode scalar values) and keep
//! the same guarantees: consecutive chunks share exactly `chunk_overlap`
//! characters, and dropping that shared prefix from every chunk after the first
//! reconstructs the input text exactly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, Document, META_CHUNK_INDEX};
use crate::error::{RagError, Result};

/// Break points tried by [`RecursiveChunker`], most preferred first.
const NATURAL_BREAKS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Which [`Chunker`] the pipeline should build from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Hard character windows.
    Fixed,
    /// Character windows that prefer natural text breaks.
    #[default]
    Recursive,
}

impl ChunkStrategy {
    /// Build the chunker for this strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_overlap >= chunk_size`.
    pub fn build(self, chunk_size: usize, chunk_overlap: usize) -> Result<Arc<dyn Chunker>> {
        Ok(match self {
            Self::Fixed => Arc::new(FixedSizeChunker::new(chunk_size, chunk_overlap)?),
            Self::Recursive => Arc::new(RecursiveChunker::new(chunk_size, chunk_overlap)?),
        })
    }
}

fn validate_window(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Config(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust
/// use pdfrag::chunking::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(4, 2).unwrap();
/// assert_eq!(chunker.split("ABCDEFGHIJ"), ["ABCD", "CDEF", "EFGH", "GHIJ"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Split raw text into chunk strings.
    pub fn split(&self, text: &str) -> Vec<String> {
        split_windows(text, self.chunk_size, self.chunk_overlap, &[])
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        into_chunks(document, self.split(&document.text))
    }
}

/// Splits text into overlapping windows that end on natural breaks when possible.
///
/// For each window the chunker looks for the last paragraph separator (`\n\n`)
/// inside it, then a line break, then a sentence end (`. `, `! `, `? `), then a
/// space. The cut must fall more than `chunk_overlap` characters into the
/// window; if no separator qualifies the window is cut at `chunk_size`.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Split raw text into chunk strings.
    pub fn split(&self, text: &str) -> Vec<String> {
        split_windows(text, self.chunk_size, self.chunk_overlap, &NATURAL_BREAKS)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        into_chunks(document, self.split(&document.text))
    }
}

fn into_chunks(document: &Document, texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert(META_CHUNK_INDEX.to_string(), i.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                text,
                metadata,
                document_id: document.id.clone(),
            }
        })
        .collect()
}

/// Byte offset of every char boundary in `text`, ending with `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Slide a `chunk_size` window over `text` in steps that keep `chunk_overlap`
/// characters shared between neighbours.
///
/// Offsets are char indices into `bounds`. A window that reaches the end of
/// the text is the last one.
fn split_windows(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let bounds = char_boundaries(text);
    let total = bounds.len() - 1;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + chunk_size).min(total);
        if hard_end == total {
            chunks.push(text[bounds[start]..].to_string());
            break;
        }

        let min_end = start + chunk_overlap + 1;
        let end =
            natural_break(text, &bounds, start, min_end, hard_end, separators).unwrap_or(hard_end);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        start = end - chunk_overlap;
    }

    chunks
}

/// Find the latest cut in `[min_end, max_end]` (char indices) that falls just
/// after one of `separators`, trying separators in order.
fn natural_break(
    text: &str,
    bounds: &[usize],
    start: usize,
    min_end: usize,
    max_end: usize,
    separators: &[&str],
) -> Option<usize> {
    let window = &text[bounds[start]..bounds[max_end]];
    separators.iter().find_map(|separator| {
        let cut = bounds[start] + window.rfind(separator)? + separator.len();
        let end = bounds.binary_search(&cut).ok()?;
        (end >= min_end).then_some(end)
    })
}
