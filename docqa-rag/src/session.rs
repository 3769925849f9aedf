//! Query-time assistant: retrieve context, then generate an answer.

use std::sync::Arc;

use tracing::info;

use crate::answer::AnswerGenerator;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::retriever::{Context, Retriever};

/// The answer to one query together with the context it was based on.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The answer text.
    pub text: String,
    /// The retrieved context.
    pub context: Context,
    /// `false` when the fixed empty-context reply was returned instead of
    /// calling the model.
    pub generated: bool,
}

/// Answers queries over a ready index.
///
/// Holding an index handle makes querying an unbuilt index impossible
/// through this type. Queries are independent: errors are per query and
/// nothing is cached between them.
pub struct RagAssistant {
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    generator: AnswerGenerator,
    top_k: usize,
    empty_context_reply: Option<String>,
}

impl RagAssistant {
    /// Create an assistant retrieving 8 chunks per query.
    pub fn new(index: Arc<dyn VectorIndex>, retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self { index, retriever, generator, top_k: 8, empty_context_reply: None }
    }

    /// Set the number of chunks retrieved per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Reply with `reply` instead of calling the model when nothing is retrieved.
    pub fn with_empty_context_reply(mut self, reply: impl Into<String>) -> Self {
        self.empty_context_reply = Some(reply.into());
        self
    }

    /// The index queries run against.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Retrieve context for `query` without generating an answer.
    pub async fn retrieve(&self, query: &str) -> Result<Context> {
        self.retriever.retrieve(self.index.as_ref(), query, self.top_k).await
    }

    /// Answer `query`.
    ///
    /// # Errors
    ///
    /// Propagates embedding, search, and generation errors for this query.
    pub async fn ask(&self, query: &str) -> Result<Answer> {
        let context = self.retrieve(query).await?;

        if context.is_empty() {
            if let Some(reply) = &self.empty_context_reply {
                info!("no context retrieved, returning fixed reply");
                return Ok(Answer { text: reply.clone(), context, generated: false });
            }
        }

        let text = self.generator.answer(&context, query).await?;
        Ok(Answer { text, context, generated: true })
    }
}
