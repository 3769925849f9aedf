//! # docqa-rag
//!
//! Retrieval-augmented question answering over PDFs and exported database
//! records.
//!
//! ## Overview
//!
//! Ingestion runs once per document set:
//!
//! 1. [`Extractor`] turns each [`Source`] into [`Document`]s
//! 2. [`Chunker`] splits documents into overlapping [`Chunk`]s
//! 3. [`EmbeddingProvider`] maps chunk texts to vectors
//! 4. [`IndexBackend`] builds a [`VectorIndex`], persisted by the
//!    [`IngestionOrchestrator`]
//!
//! Each query then flows through [`RagAssistant`]: the [`Retriever`]
//! embeds it and assembles a [`Context`] from the top-k chunks, and the
//! [`AnswerGenerator`] sends that context to a [`ChatModel`].
//!
//! Every external collaborator (extractor, embedder, index backend, chat
//! model) is an explicit `Arc<dyn Trait>` dependency, so any of them can be
//! replaced by a test double.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{
//!     HashingEmbeddingProvider, IngestionOrchestrator, PromptTemplate, RagConfig, Source,
//! };
//!
//! let mut orchestrator = IngestionOrchestrator::builder()
//!     .config(RagConfig::pdf())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)?))
//!     .location("faiss_index")
//!     .build()?;
//!
//! orchestrator.build_or_load(&[Source::from_path("notes.md")?]).await?;
//! let assistant = orchestrator.assistant(chat_model, PromptTemplate::pdf_assistant())?;
//! println!("{}", assistant.ask("What is covered?").await?.text);
//! ```
//!
//! ## Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `pdf` (default) | PDF text extraction via `pdf-extract` |
//! | `huggingface` (default) | Hugging Face embedding and chat clients |
//! | `mongodb` | Exporting MongoDB collections to JSON |

pub mod answer;
pub mod chat;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod flat;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod session;

#[cfg(feature = "huggingface")]
pub mod huggingface;
#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "huggingface")]
pub mod openai_compat;

pub use answer::{AnswerGenerator, PromptTemplate};
pub use chat::{ChatMessage, ChatModel, CompletionRequest, Role};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, Separator, TextSpan, split_text};
pub use config::{IndexPolicy, RagConfig, RagConfigBuilder, Settings};
pub use document::{Chunk, Document, IndexEntry, SearchResult};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{BoxError, RagError, Result};
pub use extract::{Extractor, Source, SourceExtractor};
pub use flat::{FlatIndex, FlatIndexBackend};
pub use index::{IndexBackend, IndexInfo, VectorIndex};
pub use pipeline::{IndexState, IngestionOrchestrator, IngestionOrchestratorBuilder};
pub use retriever::{Context, Retriever};
pub use session::{Answer, RagAssistant};

#[cfg(feature = "huggingface")]
pub use huggingface::HuggingFaceEmbeddingProvider;
#[cfg(feature = "huggingface")]
pub use openai_compat::HuggingFaceChatModel;
