//! Query-time retrieval: embed, search, and assemble a context block.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Separator placed between chunk texts in a [`Context`].
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// The ranked chunks retrieved for one query.
///
/// Built fresh per query and discarded after the answer is generated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    passages: Vec<SearchResult>,
}

impl Context {
    /// Wrap ranked search results; order is preserved as given.
    pub fn new(passages: Vec<SearchResult>) -> Self {
        Self { passages }
    }

    /// The ranked passages.
    pub fn passages(&self) -> &[SearchResult] {
        &self.passages
    }

    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Number of passages.
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    /// Chunk texts in rank order separated by a blank line.
    pub fn text(&self) -> String {
        self.passages
            .iter()
            .map(|p| p.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }
}

/// Embeds queries and looks them up in a vector index.
///
/// The embedding provider must be the one the index was built with.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    /// Create a retriever using `embedding_provider` for queries.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedding_provider, similarity_threshold: None }
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Retrieve the `top_k` best chunks for `query` from `index`.
    ///
    /// Returns an empty [`Context`] when the index yields no results.
    ///
    /// # Errors
    ///
    /// Propagates [`RagError::Embedding`] from the provider and the index's
    /// own errors ([`RagError::IndexNotBuilt`], [`RagError::DimensionMismatch`]).
    pub async fn retrieve(
        &self,
        index: &dyn VectorIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Context> {
        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        if let Some(info) = index.info() {
            if info.embedding_model != self.embedding_provider.model_name() {
                warn!(
                    index_model = %info.embedding_model,
                    query_model = %self.embedding_provider.model_name(),
                    "query embedder differs from the one that built the index"
                );
            }
        }

        let results = index.search(&query_embedding, top_k).map_err(|e| {
            if !matches!(e, RagError::IndexNotBuilt) {
                error!(error = %e, "vector index search failed");
            }
            e
        })?;

        let passages: Vec<SearchResult> = match self.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        info!(top_k, result_count = passages.len(), "retrieval completed");
        Ok(Context::new(passages))
    }
}
