//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// A boxed error used to carry the underlying cause of a failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source could not be read or converted into documents.
    #[error("Extraction error ({source_id}): {message}")]
    Extraction {
        /// Identity of the offending source (usually a file path).
        source_id: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The index was queried before it was built or loaded.
    #[error("vector index has not been built or loaded")]
    IndexNotBuilt,

    /// An error occurred while persisting or loading the vector index.
    #[error("Vector index error ({location}): {message}")]
    VectorIndex {
        /// The on-disk location of the index.
        location: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector did not have the dimensionality the index was built with.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// The language model call failed.
    #[error("Generation error ({model}): {source}")]
    Generation {
        /// The model that was invoked.
        model: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in the ingestion orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// An I/O error outside of a more specific context.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error outside of a more specific context.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Shorthand for an [`RagError::Extraction`] naming its source.
    pub fn extraction(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction { source_id: source_id.into(), message: message.into() }
    }

    /// Shorthand for a [`RagError::Generation`] with a plain message as its cause.
    pub fn generation(model: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::Generation { model: model.into(), source: cause.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
