//! Configuration for the RAG pipeline and the process environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RagError, Result};

/// What to do when a persisted index already exists at the index location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Discard the existing index and rebuild from the given sources.
    #[default]
    AlwaysRebuild,
    /// Load the existing index as-is; rebuild only when none exists.
    ReuseExisting,
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to retrieve per query.
    pub top_k: usize,
    /// Minimum similarity score for retrieved chunks, if any.
    pub similarity_threshold: Option<f32>,
    /// Number of chunk texts sent per embedding request.
    pub embed_batch_size: usize,
    /// Upper bound on tokens generated per answer.
    pub max_tokens: u32,
    /// Sampling temperature for answers; provider default when `None`.
    pub temperature: Option<f32>,
    /// Reuse or rebuild an existing persisted index.
    pub index_policy: IndexPolicy,
    /// Skip sources that fail extraction instead of failing the rebuild.
    pub skip_unreadable_sources: bool,
    /// Fixed reply returned without calling the model when nothing was retrieved.
    pub empty_context_reply: Option<String>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 8,
            similarity_threshold: None,
            embed_batch_size: 32,
            max_tokens: 800,
            temperature: None,
            index_policy: IndexPolicy::AlwaysRebuild,
            skip_unreadable_sources: false,
            empty_context_reply: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Settings for question answering over uploaded PDFs.
    pub fn pdf() -> Self {
        Self { temperature: Some(0.3), ..Self::default() }
    }

    /// Settings for question answering over exported database records.
    pub fn records() -> Self {
        Self {
            chunk_size: 3000,
            chunk_overlap: 300,
            top_k: 3,
            index_policy: IndexPolicy::ReuseExisting,
            empty_context_reply: Some(
                "No relevant information found in the knowledge base.".to_string(),
            ),
            ..Self::default()
        }
    }

    /// Start a builder from this configuration.
    pub fn to_builder(&self) -> RagConfigBuilder {
        RagConfigBuilder { config: self.clone() }
    }
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

    /// Set the number of top results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set how many texts go into one embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the answer token limit.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the policy for an existing persisted index.
    pub fn index_policy(mut self, policy: IndexPolicy) -> Self {
        self.config.index_policy = policy;
        self
    }

    /// Skip unreadable sources instead of failing the whole rebuild.
    pub fn skip_unreadable_sources(mut self, skip: bool) -> Self {
        self.config.skip_unreadable_sources = skip;
        self
    }

    /// Set the reply used when retrieval finds nothing.
    pub fn empty_context_reply(mut self, reply: impl Into<String>) -> Self {
        self.config.empty_context_reply = Some(reply.into());
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if config.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        Ok(config)
    }
}

/// Environment variable holding the Hugging Face API token.
pub const HF_TOKEN_VAR: &str = "HUGGINGFACE_TOKEN";
/// Alternative name of the token variable used by the Hugging Face tooling.
pub const HF_TOKEN_FALLBACK_VAR: &str = "HUGGINGFACEHUB_API_TOKEN";
/// Environment variable holding the MongoDB connection string.
pub const MONGO_URI_VAR: &str = "MONGO_URI";

/// Process-level settings read from the environment.
#[derive(Clone, PartialEq)]
pub struct Settings {
    /// API token for the embedding and chat services.
    pub hf_token: String,
    /// Connection string of the source database, when configured.
    pub mongo_uri: Option<String>,
    /// Chat model id.
    pub chat_model: String,
    /// Embedding model id.
    pub embedding_model: String,
    /// Output width of the embedding model.
    pub embedding_dimensions: usize,
    /// Directory of the persisted index.
    pub index_dir: PathBuf,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("hf_token", &"<redacted>")
            .field("mongo_uri", &self.mongo_uri.as_ref().map(|_| "<redacted>"))
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("index_dir", &self.index_dir)
            .finish()
    }
}

impl Settings {
    /// Default directory of the persisted index.
    pub const DEFAULT_INDEX_DIR: &'static str = "faiss_index";

    /// Load `.env` (if present) and read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if no API token is set or a numeric
    /// override does not parse.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let hf_token = non_empty(HF_TOKEN_VAR).or_else(|| non_empty(HF_TOKEN_FALLBACK_VAR)).ok_or_else(
            || {
                RagError::Config(format!(
                    "missing environment variable: {HF_TOKEN_VAR} (or {HF_TOKEN_FALLBACK_VAR})"
                ))
            },
        )?;

        let embedding_dimensions = match non_empty("DOCQA_EMBEDDING_DIMENSIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                RagError::Config(format!("DOCQA_EMBEDDING_DIMENSIONS is not a number: '{raw}'"))
            })?,
            None => 384,
        };

        Ok(Self {
            hf_token,
            mongo_uri: non_empty(MONGO_URI_VAR),
            chat_model: non_empty("DOCQA_CHAT_MODEL")
                .unwrap_or_else(|| "Qwen/Qwen2.5-7B-Instruct".to_string()),
            embedding_model: non_empty("DOCQA_EMBEDDING_MODEL")
                .unwrap_or_else(|| "intfloat/e5-small-v2".to_string()),
            embedding_dimensions,
            index_dir: non_empty("DOCQA_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_INDEX_DIR)),
        })
    }

    /// The database connection string, required when ingesting from MongoDB.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `MONGO_URI` is not set.
    pub fn require_mongo_uri(&self) -> Result<&str> {
        self.mongo_uri
            .as_deref()
            .ok_or_else(|| RagError::Config(format!("missing environment variable: {MONGO_URI_VAR}")))
    }
}
