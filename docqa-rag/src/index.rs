//! Vector index traits for storing and searching chunk embeddings.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexEntry, SearchResult};
use crate::error::Result;

/// The embedding space an index was built in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexInfo {
    /// Name of the embedding model that produced the stored vectors.
    pub embedding_model: String,
    /// Width of every stored vector.
    pub dimensions: usize,
}

/// A built (or loaded) nearest-neighbour index over [`IndexEntry`]s.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{FlatIndexBackend, IndexBackend, IndexInfo};
///
/// let index = FlatIndexBackend.build(info, entries)?;
/// let results = index.search(&query_embedding, 5)?;
/// index.save(Path::new("faiss_index")).await?;
/// ```
#[async_trait]
pub trait VectorIndex: std::fmt::Debug + Send + Sync {
    /// Return at most `top_k` entries ordered by descending similarity.
    ///
    /// Equal scores keep insertion order.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexNotBuilt`](crate::RagError::IndexNotBuilt) when the
    /// index holds no built state, and
    /// [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// when `embedding` has the wrong width.
    fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// The embedding space, or `None` if the index was never built.
    fn info(&self) -> Option<&IndexInfo>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the index stores no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the index into the directory `location`.
    async fn save(&self, location: &Path) -> Result<()>;
}

/// Creates fresh indexes and loads persisted ones.
///
/// A build never merges with earlier contents: every call produces a new
/// index from exactly the entries given.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Build a new index from a complete set of entries.
    fn build(&self, info: IndexInfo, entries: Vec<IndexEntry>) -> Result<Arc<dyn VectorIndex>>;

    /// Load an index previously written by [`VectorIndex::save`].
    async fn load(&self, location: &Path) -> Result<Arc<dyn VectorIndex>>;
}
