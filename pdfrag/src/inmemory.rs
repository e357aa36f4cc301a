//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a brute-force index kept in a
//! `Vec` behind a `tokio::sync::RwLock`. Entries keep their insertion order, so
//! equal scores always rank the same way.
//!
//! An index can optionally be bound to a storage directory. It then writes a
//! JSON snapshot (`index.json`) after every insert and reloads it on open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{IndexEntry, SearchResult};
use crate::embedding::EmbeddingSpace;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

const BACKEND: &str = "InMemory";
const SNAPSHOT_FILE: &str = "index.json";

#[derive(Debug, Default, Clone)]
struct Entries {
    items: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

impl Entries {
    fn upsert(&mut self, entry: IndexEntry) {
        match self.positions.get(&entry.id) {
            Some(&pos) => self.items[pos] = entry,
            None => {
                self.positions.insert(entry.id.clone(), self.items.len());
                self.items.push(entry);
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    space: EmbeddingSpace,
    entries: Vec<IndexEntry>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use pdfrag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new(EmbeddingSpace::new("hash-bow-384", 384));
/// assert!(index.is_empty().await?);
/// ```
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    space: EmbeddingSpace,
    entries: RwLock<Entries>,
    storage_dir: Option<PathBuf>,
}

impl InMemoryVectorIndex {
    /// Create a new empty, memory-only index for `space`.
    pub fn new(space: EmbeddingSpace) -> Self {
        Self { space, entries: RwLock::new(Entries::default()), storage_dir: None }
    }

    /// Open an index persisted under `dir`, creating the directory if needed.
    ///
    /// An existing snapshot is loaded; otherwise the index starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingMismatch`] if the snapshot was written for
    /// another embedding space, and [`RagError::Index`] if it cannot be read.
    pub async fn open(dir: impl AsRef<Path>, space: EmbeddingSpace) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_storage_dir(&dir).await?;
        let path = dir.join(SNAPSHOT_FILE);

        let mut entries = Entries::default();
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    RagError::index(BACKEND, format!("corrupt snapshot {}: {e}", path.display()))
                })?;
                snapshot.space.ensure_matches(&space)?;
                for entry in snapshot.entries {
                    entries.upsert(entry);
                }
                info!(
                    path = %path.display(),
                    entry_count = entries.items.len(),
                    "loaded index snapshot"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no index snapshot, starting empty");
            }
            Err(e) => {
                return Err(RagError::index(BACKEND, format!("read {}: {e}", path.display())));
            }
        }

        Ok(Self { space, entries: RwLock::new(entries), storage_dir: Some(dir) })
    }

    /// Create an empty index that persists under `dir`.
    ///
    /// Any existing snapshot is ignored and replaced by the first insert.
    pub async fn create(dir: impl AsRef<Path>, space: EmbeddingSpace) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_storage_dir(&dir).await?;
        Ok(Self { space, entries: RwLock::new(Entries::default()), storage_dir: Some(dir) })
    }

    /// The directory this index persists to, if any.
    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    /// Write the current entries to the snapshot file.
    ///
    /// The snapshot is written to a temporary file in the same directory and
    /// renamed into place, so readers never see a half-written file.
    async fn persist(&self, dir: &Path, entries: &Entries) -> Result<()> {
        let dir = dir.to_path_buf();
        let body = serde_json::to_vec(&Snapshot {
            space: self.space.clone(),
            entries: entries.items.clone(),
        })
        .map_err(|e| RagError::index(BACKEND, e))?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            use std::io::Write;
            let target = dir.join(SNAPSHOT_FILE);
            let failed = |e: std::io::Error| {
                RagError::index(BACKEND, format!("write {}: {e}", target.display()))
            };
            let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(failed)?;
            file.write_all(&body).map_err(failed)?;
            file.as_file().sync_all().map_err(failed)?;
            file.persist(&target).map_err(|e| failed(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| RagError::index(BACKEND, e))?
    }
}

async fn create_storage_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RagError::index(BACKEND, format!("create {}: {e}", dir.display())))
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != self.space.dimensions) {
            return Err(RagError::embedding(
                &self.space.model_id,
                format!(
                    "entry {} has {} dimensions, index expects {}",
                    bad.id,
                    bad.embedding.len(),
                    self.space.dimensions
                ),
            ));
        }

        let mut store = self.entries.write().await;
        let Some(dir) = self.storage_dir.as_deref() else {
            for entry in entries {
                store.upsert(entry);
            }
            return Ok(());
        };

        // The live entries only change once the snapshot is on disk.
        let mut next = store.clone();
        for entry in entries {
            next.upsert(entry);
        }
        self.persist(dir, &next).await?;
        *store = next;
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if embedding.len() != self.space.dimensions {
            return Err(RagError::embedding(
                &self.space.model_id,
                format!(
                    "query has {} dimensions, index expects {}",
                    embedding.len(),
                    self.space.dimensions
                ),
            ));
        }

        let store = self.entries.read().await;
        let mut scored: Vec<SearchResult> = store
            .items
            .iter()
            .map(|entry| SearchResult {
                entry: entry.clone(),
                score: cosine_similarity(&entry.embedding, embedding),
            })
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.items.len())
    }
}
