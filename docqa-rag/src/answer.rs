//! Answer generation: prompt the language model with retrieved context.

use std::sync::Arc;

use tracing::{error, info};

use crate::chat::{ChatMessage, ChatModel, CompletionRequest};
use crate::error::{RagError, Result};
use crate::retriever::Context;

/// Placeholder replaced with the context text.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// A system instruction with a `{context}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the template has no `{context}` placeholder.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(CONTEXT_PLACEHOLDER) {
            return Err(RagError::Config(format!(
                "prompt template must contain the {CONTEXT_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self { template })
    }

    /// Answer from PDF context first, falling back to general knowledge.
    pub fn pdf_assistant() -> Self {
        Self {
            template: "You are a helpful assistant. First, use the following PDF context to \
                       answer the question. If the context does not contain the answer, then \
                       use your own knowledge.\n\nContext:\n{context}"
                .to_string(),
        }
    }

    /// Answer strictly from exported JSON records.
    pub fn records_assistant() -> Self {
        Self {
            template: "You are an expert data assistant. You are given user data in JSON \
                       format. You must ONLY answer based on this JSON data, no SQL, no \
                       assumptions. If the query is 'give me all users', output a list of all \
                       user records from context. If you cannot find the data, reply exactly: \
                       'I don't know based on the given data'.\n\nContext:\n{context}"
                .to_string(),
        }
    }

    /// Substitute `context` into the template.
    pub fn render(&self, context: &str) -> String {
        self.template.replace(CONTEXT_PLACEHOLDER, context)
    }
}

/// Sends context and query to a [`ChatModel`] and returns its completion.
///
/// Every call reaches the model; nothing is cached and nothing is retried.
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnswerGenerator {
    /// Create a generator with the PDF prompt and an 800-token limit.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, prompt: PromptTemplate::pdf_assistant(), max_tokens: 800, temperature: None }
    }

    /// Use a different system prompt.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Limit the generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the completion request for `context` and `query`.
    pub fn request(&self, context: &Context, query: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage::system(self.prompt.render(&context.text())),
                ChatMessage::user(query),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Return the model's raw completion for `query` given `context`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Generation`] with the underlying cause attached
    /// when the model call fails.
    pub async fn answer(&self, context: &Context, query: &str) -> Result<String> {
        let request = self.request(context, query);
        let model = self.model.name().to_string();

        let text = self.model.complete(request).await.map_err(|e| match e {
            RagError::Generation { .. } => {
                error!(model = %model, error = %e, "generation failed");
                e
            }
            other => {
                error!(model = %model, error = %other, "generation failed");
                RagError::Generation { model: model.clone(), source: Box::new(other) }
            }
        })?;

        info!(model = %model, passages = context.len(), answer_len = text.len(), "generated answer");
        Ok(text)
    }
}
