//! Document loaders: turn uploaded bytes into pages of text.
//!
//! - [`PdfLoader`]: stages the upload in a temporary file and extracts text
//!   with `pdf-extract`, one [`Page`] per PDF page
//! - [`TextLoader`]: treats the upload as a single page of UTF-8 text
//! - [`AutoLoader`]: picks one of the above from the file's magic bytes or name

use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::document::Page;
use crate::error::{RagError, Result};

/// Decodes raw document bytes into ordered pages of text.
///
/// Implementations are synchronous; the pipeline runs them on the blocking
/// thread pool.
pub trait DocumentLoader: Send + Sync {
    /// Decode `bytes` (named `source`) into pages.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Decode`] if the bytes are not a readable document.
    fn decode(&self, source: &str, bytes: &[u8]) -> Result<Vec<Page>>;
}

/// Extracts text from PDF files.
///
/// Each upload is written to a staging file that is deleted when decoding
/// finishes, on success, on error, and on panic unwind.
#[derive(Debug, Clone, Default)]
pub struct PdfLoader {
    staging_dir: Option<PathBuf>,
}

impl PdfLoader {
    /// Create a loader that stages files in the system temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage files under `dir` instead of the system temp directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    fn stage(&self, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pdfrag-").suffix(".pdf");
        let mut file = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }
}

impl DocumentLoader for PdfLoader {
    fn decode(&self, source: &str, bytes: &[u8]) -> Result<Vec<Page>> {
        let staged = self
            .stage(bytes)
            .map_err(|e| RagError::decode(source, format!("failed to stage upload: {e}")))?;
        debug!(source, path = %staged.path().display(), "staged upload");

        // pdf-extract panics on some malformed inputs.
        let extracted = std::panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(staged.path())
        }))
        .map_err(|_| RagError::decode(source, "PDF decoder panicked"))?;
        let texts = extracted
            .map_err(|e| RagError::decode(source, format!("failed to extract PDF text: {e}")))?;
        Ok(number_pages(texts))
    }
}

/// Pair page texts, in document order, with 1-based page numbers.
pub fn number_pages(texts: Vec<String>) -> Vec<Page> {
    texts.into_iter().enumerate().map(|(i, text)| Page { text, number: i + 1 }).collect()
}

/// Reads uploads as a single page of UTF-8 text.
///
/// Invalid UTF-8 sequences are replaced; content containing NUL bytes is
/// rejected as binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn decode(&self, source: &str, bytes: &[u8]) -> Result<Vec<Page>> {
        if bytes.contains(&0) {
            return Err(RagError::decode(source, "binary content is not text"));
        }
        Ok(vec![Page { text: String::from_utf8_lossy(bytes).into_owned(), number: 1 }])
    }
}

/// Dispatches to [`PdfLoader`] for PDFs and [`TextLoader`] for everything else.
///
/// A file counts as a PDF if it starts with the `%PDF` magic or its name ends
/// in `.pdf`.
#[derive(Debug, Clone, Default)]
pub struct AutoLoader {
    pdf: PdfLoader,
    text: TextLoader,
}

impl AutoLoader {
    /// Create a loader with the given PDF loader configuration.
    pub fn new(pdf: PdfLoader) -> Self {
        Self { pdf, text: TextLoader }
    }

    fn is_pdf(source: &str, bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF") || source.to_ascii_lowercase().ends_with(".pdf")
    }
}

impl DocumentLoader for AutoLoader {
    fn decode(&self, source: &str, bytes: &[u8]) -> Result<Vec<Page>> {
        if Self::is_pdf(source, bytes) {
            self.pdf.decode(source, bytes)
        } else {
            self.text.decode(source, bytes)
        }
    }
}
