//! Exact cosine-similarity index persisted as JSON.
//!
//! [`FlatIndex`] keeps every entry in insertion order and scores all of them
//! on each query. It is the local stand-in for an approximate index service
//! and is fast enough for the few thousand chunks a document set produces.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::index::{IndexBackend, IndexInfo, VectorIndex};

/// Name of the snapshot file inside an index directory.
pub const INDEX_FILE_NAME: &str = "index.json";

const FORMAT_VERSION: u32 = 1;

/// Header stored alongside the entries of a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Snapshot format version.
    pub format_version: u32,
    /// Embedding space of the stored vectors.
    #[serde(flatten)]
    pub info: IndexInfo,
    /// Number of stored entries.
    pub entry_count: usize,
    /// When the index was built.
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
struct BuiltIndex {
    info: IndexInfo,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// An exact nearest-neighbour index using cosine similarity.
///
/// A default-constructed index is unbuilt: [`search`](VectorIndex::search)
/// and [`save`](VectorIndex::save) fail with [`RagError::IndexNotBuilt`].
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    built: Option<BuiltIndex>,
}

impl FlatIndex {
    /// Create an index that has not been built yet.
    pub fn unbuilt() -> Self {
        Self::default()
    }

    /// Build an index from a complete set of entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any entry's embedding width
    /// differs from `info.dimensions`.
    pub fn build(info: IndexInfo, entries: Vec<IndexEntry>) -> Result<Self> {
        check_widths(&info, &entries)?;
        info!(entry_count = entries.len(), dimensions = info.dimensions, "built flat index");
        Ok(Self { built: Some(BuiltIndex { info, created_at: Utc::now(), entries }) })
    }

    /// Load an index from the directory `location`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorIndex`] if the snapshot is missing, unreadable,
    /// of an unknown format version, or internally inconsistent.
    pub async fn load(location: &Path) -> Result<Self> {
        let path = location.join(INDEX_FILE_NAME);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            error!(location = %location.display(), error = %e, "failed to read index");
            index_error(location, format!("failed to read {}: {e}", path.display()))
        })?;

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            error!(location = %location.display(), error = %e, "failed to parse index");
            index_error(location, format!("failed to parse snapshot: {e}"))
        })?;

        let manifest = snapshot.manifest;
        if manifest.format_version != FORMAT_VERSION {
            return Err(index_error(
                location,
                format!("unsupported format version {}", manifest.format_version),
            ));
        }
        if manifest.entry_count != snapshot.entries.len() {
            return Err(index_error(
                location,
                format!(
                    "manifest lists {} entries, snapshot holds {}",
                    manifest.entry_count,
                    snapshot.entries.len()
                ),
            ));
        }
        check_widths(&manifest.info, &snapshot.entries)
            .map_err(|e| index_error(location, e.to_string()))?;

        info!(
            location = %location.display(),
            entry_count = manifest.entry_count,
            embedding_model = %manifest.info.embedding_model,
            "loaded flat index"
        );

        Ok(Self {
            built: Some(BuiltIndex {
                info: manifest.info,
                created_at: manifest.created_at,
                entries: snapshot.entries,
            }),
        })
    }

    /// The stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        self.built.as_ref().map(|b| b.entries.as_slice()).unwrap_or_default()
    }

    fn built(&self) -> Result<&BuiltIndex> {
        self.built.as_ref().ok_or(RagError::IndexNotBuilt)
    }
}

fn index_error(location: &Path, message: impl Into<String>) -> RagError {
    RagError::VectorIndex { location: location.display().to_string(), message: message.into() }
}

fn check_widths(info: &IndexInfo, entries: &[IndexEntry]) -> Result<()> {
    match entries.iter().find(|e| e.embedding.len() != info.dimensions) {
        Some(entry) => Err(RagError::DimensionMismatch {
            expected: info.dimensions,
            actual: entry.embedding.len(),
        }),
        None => Ok(()),
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude. Never returns `-0.0`, so
/// orthogonal entries tie under `total_cmp`.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b) + 0.0
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let built = self.built()?;
        if embedding.len() != built.info.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: built.info.dimensions,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = built
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&entry.embedding, embedding)))
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        let results: Vec<SearchResult> = scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: built.entries[i].chunk.clone(), score })
            .collect();

        debug!(top_k, result_count = results.len(), "flat index search");
        Ok(results)
    }

    fn info(&self) -> Option<&IndexInfo> {
        self.built.as_ref().map(|b| &b.info)
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    async fn save(&self, location: &Path) -> Result<()> {
        let built = self.built()?;

        tokio::fs::create_dir_all(location).await.map_err(|e| {
            error!(location = %location.display(), error = %e, "failed to create index directory");
            index_error(location, format!("failed to create directory: {e}"))
        })?;

        let snapshot = Snapshot {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                info: built.info.clone(),
                entry_count: built.entries.len(),
                created_at: built.created_at,
            },
            entries: built.entries.clone(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        tokio::fs::write(location.join(INDEX_FILE_NAME), bytes).await.map_err(|e| {
            error!(location = %location.display(), error = %e, "failed to write index");
            index_error(location, format!("failed to write snapshot: {e}"))
        })?;

        info!(location = %location.display(), entry_count = built.entries.len(), "saved flat index");
        Ok(())
    }
}

/// [`IndexBackend`] producing [`FlatIndex`]es.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatIndexBackend;

#[async_trait]
impl IndexBackend for FlatIndexBackend {
    fn build(&self, info: IndexInfo, entries: Vec<IndexEntry>) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(FlatIndex::build(info, entries)?))
    }

    async fn load(&self, location: &Path) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::new(FlatIndex::load(location).await?))
    }
}
