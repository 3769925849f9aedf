//! Hugging Face embedding provider using the Inference feature-extraction API.
//!
//! This module is only available when the `huggingface` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default Hugging Face inference router.
pub const HF_INFERENCE_BASE_URL: &str = "https://router.huggingface.co/hf-inference";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "intfloat/e5-small-v2";

/// The dimensionality of `intfloat/e5-small-v2`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

const PROVIDER: &str = "HuggingFace";

/// An [`EmbeddingProvider`] backed by the Hugging Face Inference API.
///
/// Uses `reqwest` to call the `feature-extraction` pipeline of a
/// sentence-embedding model. Every returned vector is checked against the
/// configured dimensionality.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::huggingface::HuggingFaceEmbeddingProvider;
///
/// let provider = HuggingFaceEmbeddingProvider::new("hf_...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct HuggingFaceEmbeddingProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    model: String,
    dimensions: usize,
    normalize: bool,
}

impl HuggingFaceEmbeddingProvider {
    /// Create a new provider with the given API token.
    ///
    /// Uses the default model (`intfloat/e5-small-v2`) and dimensions (384).
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(RagError::Embedding {
                provider: PROVIDER.into(),
                message: "API token must not be empty".into(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_token,
            base_url: HF_INFERENCE_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            normalize: true,
        })
    }

    /// Set the model id and its output dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Override the inference base URL (self-hosted TEI, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Ask the server to L2-normalise the returned vectors (default `true`).
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}/pipeline/feature-extraction",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn embedding_error(message: impl Into<String>) -> RagError {
        RagError::Embedding { provider: PROVIDER.into(), message: message.into() }
    }
}

// ── Inference API request/response types ───────────────────────────

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: Vec<&'a str>,
    normalize: bool,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

fn parse_embeddings(body: &str) -> std::result::Result<Vec<Vec<f32>>, serde_json::Error> {
    serde_json::from_str(body)
}

fn parse_error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body)
}

/// Check count, width, and finiteness of the returned vectors.
fn check_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
    dimensions: usize,
) -> std::result::Result<(), String> {
    if embeddings.len() != expected_count {
        return Err(format!("returned {} vectors for {expected_count} inputs", embeddings.len()));
    }
    if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
        return Err(format!("returned {} dimensions, expected {dimensions}", bad.len()));
    }
    if embeddings.iter().flatten().any(|x| !x.is_finite()) {
        return Err("returned non-finite values".to_string());
    }
    Ok(())
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| Self::embedding_error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body =
            FeatureExtractionRequest { inputs: texts.to_vec(), normalize: self.normalize };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::embedding_error(format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to read response body");
            Self::embedding_error(format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            error!(provider = PROVIDER, %status, "API error");
            return Err(Self::embedding_error(format!(
                "API returned {status}: {}",
                parse_error_detail(body)
            )));
        }

        let embeddings = parse_embeddings(&body).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::embedding_error(format!("failed to parse response: {e}"))
        })?;

        check_embeddings(&embeddings, texts.len(), self.dimensions).map_err(|message| {
            error!(provider = PROVIDER, model = %self.model, %message, "invalid embeddings");
            Self::embedding_error(format!("model '{}' {message}", self.model))
        })?;

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
