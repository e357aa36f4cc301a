//! Configuration for indexing and retrieval.
//!
//! [`RagConfig`] can be built in code with [`RagConfig::builder`] or loaded
//! with figment from `pdfrag.toml` overlaid with `PDFRAG_*` environment
//! variables (`__` separates nested keys, e.g. `PDFRAG_SERVER__PORT`).
//! Path values may use `~` and `$VAR`/`${VAR}`.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::chunking::ChunkStrategy;
use crate::error::{RagError, Result};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "pdfrag.toml";
/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "PDFRAG_";
/// Default embedding model identifier.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Configuration parameters for the indexing pipeline and retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// How chunk boundaries are chosen.
    pub chunk_strategy: ChunkStrategy,
    /// Number of neighbours fetched per query.
    pub top_k: usize,
    /// Number of chunks sent to the embedder per call.
    pub embed_batch_size: usize,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Directory with local model files (`config.json`, `tokenizer.json`,
    /// `model.safetensors`). Without it a hashing embedder is used.
    pub model_dir: Option<PathBuf>,
    /// Where the vector index snapshot is kept. `None` keeps it in memory only.
    pub storage_dir: Option<PathBuf>,
    /// Where uploads are staged while being decoded. Defaults to the system
    /// temp directory.
    pub staging_dir: Option<PathBuf>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            chunk_strategy: ChunkStrategy::default(),
            top_k: 3,
            embed_batch_size: 32,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            model_dir: None,
            storage_dir: None,
            staging_dir: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The figment used by [`RagConfig::load`]: defaults, then the TOML file
    /// at `path` (if present), then `PDFRAG_*` environment variables.
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(RagConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from `pdfrag.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a value has the wrong type or the
    /// result fails validation.
    pub fn load() -> Result<Self> {
        Self::from_figment(&Self::figment(CONFIG_FILE))
    }

    /// Extract, expand paths, and validate a configuration from `figment`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] on extraction or validation failure.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let mut config: RagConfig =
            figment.extract().map_err(|e| RagError::Config(e.to_string()))?;
        for path in [&mut config.model_dir, &mut config.storage_dir, &mut config.staging_dir]
            .into_iter()
            .flatten()
        {
            let expanded = expand_path(&path.to_string_lossy());
            *path = expanded;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    /// - `embedding_model` is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(RagError::Config("embedding_model must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Expand a leading `~` and `$VAR`/`${VAR}` references in a path.
///
/// Unknown variables are left as written.
pub fn expand_path(input: &str) -> PathBuf {
    let with_env = shellexpand::env(input).unwrap_or(std::borrow::Cow::Borrowed(input));
    PathBuf::from(shellexpand::tilde(&with_env).as_ref())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the chunking strategy.
    pub fn chunk_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunk_strategy = strategy;
        self
    }

    /// Set the number of neighbours fetched per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of chunks embedded per embedder call.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the local model directory.
    pub fn model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.model_dir = Some(dir.into());
        self
    }

    /// Persist the index under `dir`.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    /// Stage uploads under `dir`.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
