//! Chat-completion capability used by the answer generator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// The end user's turn.
    User,
    /// A model reply.
    Assistant,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation so far, system message first.
    pub messages: Vec<ChatMessage>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature; the provider default when `None`.
    pub temperature: Option<f32>,
}

/// A hosted or local language model that completes chat conversations.
///
/// Implementations must not retry on their own and must report failures as
/// [`RagError::Generation`](crate::RagError::Generation) with the underlying
/// cause attached.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier of the model, used in logs and errors.
    fn name(&self) -> &str;

    /// Return the raw completion text for `request`.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
