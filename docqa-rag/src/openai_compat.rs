//! Chat model client for OpenAI-compatible `/v1/chat/completions` endpoints.
//!
//! The Hugging Face inference router speaks this protocol, as do vLLM, TGI,
//! and Ollama. This module is only available when the `huggingface` feature
//! is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::chat::{ChatMessage, ChatModel, CompletionRequest};
use crate::error::{RagError, Result};

/// The default Hugging Face OpenAI-compatible router.
pub const HF_ROUTER_BASE_URL: &str = "https://router.huggingface.co/v1";

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "Qwen/Qwen2.5-7B-Instruct";

/// A [`ChatModel`] that posts to `{base_url}/chat/completions`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai_compat::HuggingFaceChatModel;
///
/// let model = HuggingFaceChatModel::new("hf_...")?.with_model("Qwen/Qwen2.5-7B-Instruct");
/// let reply = model.complete(request).await?;
/// ```
pub struct HuggingFaceChatModel {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    model: String,
}

impl HuggingFaceChatModel {
    /// Create a client for the default model on the Hugging Face router.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(RagError::Config("chat API token must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_token,
            base_url: HF_ROUTER_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Set the model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ── Chat completions request/response types ────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Message(String),
    Detail { message: String },
}

fn parse_error_detail(body: String) -> String {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { error: ErrorBody::Message(message) }) => message,
        Ok(ErrorResponse { error: ErrorBody::Detail { message } }) => message,
        Err(_) => body,
    }
}

fn first_choice_content(response: ChatCompletionResponse) -> Option<String> {
    response.choices.into_iter().next().and_then(|c| c.message.content)
}

#[async_trait]
impl ChatModel for HuggingFaceChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        debug!(
            model = %self.model,
            message_count = request.messages.len(),
            max_tokens = request.max_tokens,
            "requesting chat completion"
        );

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %self.model, error = %e, "chat request failed");
                RagError::generation(self.model.clone(), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(model = %self.model, %status, "chat API error");
            return Err(RagError::generation(
                self.model.clone(),
                format!("API returned {status}: {}", parse_error_detail(body)),
            ));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse chat response");
            RagError::generation(self.model.clone(), e)
        })?;

        first_choice_content(parsed).ok_or_else(|| {
            RagError::generation(self.model.clone(), "response contained no message content")
        })
    }
}
