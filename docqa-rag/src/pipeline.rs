//! Ingestion orchestrator.
//!
//! The [`IngestionOrchestrator`] wires extraction, chunking, embedding, and
//! indexing into one batch job and owns the persisted index location. It is a
//! two-state machine: [`IndexState::NoIndex`] until
//! [`build_or_load`](IngestionOrchestrator::build_or_load) succeeds, then
//! [`IndexState::Ready`]. Each call starts the cycle over.
//!
//! A rebuild is all-or-nothing. Any extraction or embedding failure aborts it
//! and leaves the orchestrator in `NoIndex`. The new index is written to a
//! sibling staging directory and swapped into place only after it has been
//! saved completely. The swap is not safe against concurrent readers of the
//! index directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{IngestionOrchestrator, RagConfig, Source};
//!
//! let mut orchestrator = IngestionOrchestrator::builder()
//!     .config(RagConfig::pdf())
//!     .embedding_provider(Arc::new(embedder))
//!     .location("faiss_index")
//!     .build()?;
//!
//! orchestrator.build_or_load(&[Source::from_path("report.pdf")?]).await?;
//! let assistant = orchestrator.assistant(model, PromptTemplate::pdf_assistant())?;
//! let answer = assistant.ask("What does the report conclude?").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::answer::{AnswerGenerator, PromptTemplate};
use crate::chat::ChatModel;
use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::{IndexPolicy, RagConfig};
use crate::document::{Document, IndexEntry};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{Extractor, Source, SourceExtractor};
use crate::flat::FlatIndexBackend;
use crate::index::{IndexBackend, IndexInfo, VectorIndex};
use crate::retriever::Retriever;
use crate::session::RagAssistant;

/// Lifecycle state of the orchestrator's index.
#[derive(Clone, Default)]
pub enum IndexState {
    /// No index has been built or loaded in this cycle.
    #[default]
    NoIndex,
    /// An index is built (or loaded) and ready to answer queries.
    Ready(Arc<dyn VectorIndex>),
}

impl std::fmt::Debug for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoIndex => f.write_str("NoIndex"),
            Self::Ready(index) => f.debug_tuple("Ready").field(&index.len()).finish(),
        }
    }
}

/// Builds the vector index from sources and hands out query assistants.
pub struct IngestionOrchestrator {
    config: RagConfig,
    extractor: Arc<dyn Extractor>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn IndexBackend>,
    location: PathBuf,
    state: IndexState,
}

impl IngestionOrchestrator {
    /// Create a new [`IngestionOrchestratorBuilder`].
    pub fn builder() -> IngestionOrchestratorBuilder {
        IngestionOrchestratorBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Directory of the persisted index.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &IndexState {
        &self.state
    }

    /// Whether an index is ready for queries.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, IndexState::Ready(_))
    }

    /// The ready index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotBuilt`] in the `NoIndex` state.
    pub fn index(&self) -> Result<Arc<dyn VectorIndex>> {
        match &self.state {
            IndexState::Ready(index) => Ok(Arc::clone(index)),
            IndexState::NoIndex => Err(RagError::IndexNotBuilt),
        }
    }

    /// Bring the index to `Ready` for `sources`.
    ///
    /// Under [`IndexPolicy::AlwaysRebuild`] any persisted index is replaced by
    /// one built from exactly `sources`. Under [`IndexPolicy::ReuseExisting`]
    /// an existing index directory is loaded as-is and `sources` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] when a reused index has a
    /// different width than the embedding provider. Otherwise returns the
    /// first extraction, embedding, or persistence error. The
    /// orchestrator is left in `NoIndex` and no partial index is persisted.
    pub async fn build_or_load(&mut self, sources: &[Source]) -> Result<Arc<dyn VectorIndex>> {
        self.state = IndexState::NoIndex;

        let exists = tokio::fs::try_exists(&self.location).await?;
        let index = if exists && self.config.index_policy == IndexPolicy::ReuseExisting {
            info!(location = %self.location.display(), "reusing existing index");
            let index = self.backend.load(&self.location).await?;
            self.check_compatible(index.as_ref())?;
            index
        } else {
            if exists {
                info!(location = %self.location.display(), "existing index will be replaced");
            }
            self.rebuild(sources).await?
        };

        self.state = IndexState::Ready(Arc::clone(&index));
        Ok(index)
    }

    /// Verify a loaded index lives in this orchestrator's embedding space.
    ///
    /// A width mismatch is fatal since no query could be answered. A different
    /// model name with the same width is only logged.
    fn check_compatible(&self, index: &dyn VectorIndex) -> Result<()> {
        let Some(info) = index.info() else {
            return Err(RagError::IndexNotBuilt);
        };

        let dimensions = self.embedding_provider.dimensions();
        if info.dimensions != dimensions {
            error!(
                location = %self.location.display(),
                index_dimensions = info.dimensions,
                embedder_dimensions = dimensions,
                "persisted index does not match the embedder"
            );
            return Err(RagError::DimensionMismatch { expected: info.dimensions, actual: dimensions });
        }

        if info.embedding_model != self.embedding_provider.model_name() {
            warn!(
                location = %self.location.display(),
                index_model = %info.embedding_model,
                embedder_model = %self.embedding_provider.model_name(),
                "persisted index was built with a different embedding model"
            );
        }
        Ok(())
    }

    async fn rebuild(&self, sources: &[Source]) -> Result<Arc<dyn VectorIndex>> {
        let documents = self.extract_all(sources).await?;
        let entries = self.embed_documents(&documents).await?;

        let info = IndexInfo {
            embedding_model: self.embedding_provider.model_name().to_string(),
            dimensions: self.embedding_provider.dimensions(),
        };
        let index = self.backend.build(info, entries)?;
        self.persist(index.as_ref()).await?;

        info!(
            location = %self.location.display(),
            source_count = sources.len(),
            document_count = documents.len(),
            entry_count = index.len(),
            "index rebuilt"
        );
        Ok(index)
    }

    /// Extract documents from every source, in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RagError::Extraction`] unless
    /// `skip_unreadable_sources` is set, in which case failing sources are
    /// logged and skipped. Fails with [`RagError::Pipeline`] if sources were
    /// given but none could be extracted.
    pub async fn extract_all(&self, sources: &[Source]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut skipped = 0usize;

        for source in sources {
            match self.extractor.extract(source).await {
                Ok(extracted) => documents.extend(extracted),
                Err(e) if self.config.skip_unreadable_sources => {
                    warn!(source = %source.id(), error = %e, "skipping unreadable source");
                    skipped += 1;
                }
                Err(e) => {
                    error!(source = %source.id(), error = %e, "extraction failed, aborting rebuild");
                    return Err(e);
                }
            }
        }

        if !sources.is_empty() && skipped == sources.len() {
            return Err(RagError::Pipeline(format!(
                "none of the {} sources could be extracted",
                sources.len()
            )));
        }

        Ok(documents)
    }

    /// Chunk and embed documents into index entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] naming the document when the provider
    /// fails, returns the wrong number or width of vectors, or returns NaN or
    /// infinite components.
    pub async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<IndexEntry>> {
        let dimensions = self.embedding_provider.dimensions();
        let mut entries = Vec::new();

        for document in documents {
            let chunks = self.chunker.chunk(document);
            if chunks.is_empty() {
                info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
                continue;
            }

            for batch in chunks.chunks(self.config.embed_batch_size) {
                let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
                let embeddings =
                    self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                        error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
                        with_document(e, &document.id)
                    })?;

                if embeddings.len() != batch.len() {
                    return Err(self.embedding_error(
                        &document.id,
                        format!("expected {} vectors, got {}", batch.len(), embeddings.len()),
                    ));
                }
                if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
                    return Err(self.embedding_error(
                        &document.id,
                        format!("expected {dimensions} dimensions, got {}", bad.len()),
                    ));
                }
                if embeddings.iter().flatten().any(|x| !x.is_finite()) {
                    return Err(self.embedding_error(
                        &document.id,
                        "vector contains non-finite values".to_string(),
                    ));
                }

                entries.extend(
                    batch
                        .iter()
                        .cloned()
                        .zip(embeddings)
                        .map(|(chunk, embedding)| IndexEntry { chunk, embedding }),
                );
            }

            info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        }

        Ok(entries)
    }

    fn embedding_error(&self, document_id: &str, message: String) -> RagError {
        error!(document.id = %document_id, %message, "embedding provider returned bad output");
        RagError::Embedding {
            provider: self.embedding_provider.model_name().to_string(),
            message: format!("document '{document_id}': {message}"),
        }
    }

    /// Save `index` to a staging directory, then swap it into `location`.
    async fn persist(&self, index: &dyn VectorIndex) -> Result<()> {
        let staging = staging_path(&self.location)?;
        if tokio::fs::try_exists(&staging).await? {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        if let Err(e) = index.save(&staging).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        if tokio::fs::try_exists(&self.location).await? {
            tokio::fs::remove_dir_all(&self.location).await.map_err(|e| {
                error!(location = %self.location.display(), error = %e, "failed to remove old index");
                RagError::VectorIndex {
                    location: self.location.display().to_string(),
                    message: format!("failed to remove previous index: {e}"),
                }
            })?;
        }

        tokio::fs::rename(&staging, &self.location).await.map_err(|e| {
            error!(location = %self.location.display(), error = %e, "failed to swap in new index");
            RagError::VectorIndex {
                location: self.location.display().to_string(),
                message: format!("failed to move staged index into place: {e}"),
            }
        })
    }

    /// Create a query assistant over the ready index.
    ///
    /// The assistant embeds queries with this orchestrator's embedding
    /// provider and takes `top_k`, thresholds, token limits, and the
    /// empty-context reply from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotBuilt`] in the `NoIndex` state.
    pub fn assistant(
        &self,
        model: Arc<dyn ChatModel>,
        prompt: PromptTemplate,
    ) -> Result<RagAssistant> {
        let index = self.index()?;
        let retriever = Retriever::new(Arc::clone(&self.embedding_provider))
            .with_similarity_threshold(self.config.similarity_threshold);
        let generator = AnswerGenerator::new(model)
            .with_prompt(prompt)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let mut assistant =
            RagAssistant::new(index, retriever, generator).with_top_k(self.config.top_k);
        if let Some(reply) = &self.config.empty_context_reply {
            assistant = assistant.with_empty_context_reply(reply.clone());
        }
        Ok(assistant)
    }
}

fn with_document(error: RagError, document_id: &str) -> RagError {
    match error {
        RagError::Embedding { provider, message } => {
            RagError::Embedding { provider, message: format!("document '{document_id}': {message}") }
        }
        other => other,
    }
}

fn staging_path(location: &Path) -> Result<PathBuf> {
    let name = location.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        RagError::Config(format!("index location '{}' has no directory name", location.display()))
    })?;
    Ok(location.with_file_name(format!("{name}.staging")))
}

/// Builder for constructing an [`IngestionOrchestrator`].
///
/// `embedding_provider` and `location` are required. The remaining parts
/// default to [`RagConfig::default`], [`SourceExtractor`], a
/// [`RecursiveChunker::markdown`] sized from the config, and
/// [`FlatIndexBackend`].
#[derive(Default)]
pub struct IngestionOrchestratorBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn Extractor>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    backend: Option<Arc<dyn IndexBackend>>,
    location: Option<PathBuf>,
}

impl IngestionOrchestratorBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the source extractor.
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the index backend.
    pub fn backend(mut self, backend: Arc<dyn IndexBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the directory of the persisted index.
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Build the [`IngestionOrchestrator`] in the `NoIndex` state.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<IngestionOrchestrator> {
        let config = match self.config {
            Some(config) => config.to_builder().build()?,
            None => RagConfig::default(),
        };
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let location =
            self.location.ok_or_else(|| RagError::Config("location is required".to_string()))?;
        staging_path(&location)?;

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(
                RecursiveChunker::markdown(config.chunk_size, config.chunk_overlap)
                    .map_err(|e| RagError::Config(e.to_string()))?,
            ),
        };

        Ok(IngestionOrchestrator {
            config,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(SourceExtractor)),
            chunker,
            embedding_provider,
            backend: self.backend.unwrap_or_else(|| Arc::new(FlatIndexBackend)),
            location,
            state: IndexState::NoIndex,
        })
    }
}
