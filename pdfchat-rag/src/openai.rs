//! OpenAI embedding and chat-completion providers.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! providers speak the OpenAI HTTP API directly through `reqwest`, so any
//! OpenAI-compatible endpoint works via [`OpenAIEmbeddingProvider::with_base_url`]
//! and [`OpenAICompletionProvider::with_base_url`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{CompletionProvider, CompletionRequest};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "OpenAI";

fn api_key_from_env() -> std::result::Result<String, String> {
    std::env::var("OPENAI_API_KEY")
        .map_err(|_| "OPENAI_API_KEY environment variable not set".to_string())
}

/// Whether an HTTP status is worth retrying.
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Extract the API's error message from a response body, falling back to the raw body.
fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::embedding(PROVIDER, "API key must not be empty", false));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = api_key_from_env().map_err(|m| RagError::embedding(PROVIDER, m, false))?;
        Self::new(api_key)
    }

    /// Point the provider at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response", false))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::embedding(PROVIDER, format!("request failed: {e}"), true)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::embedding(
                PROVIDER,
                format!("API returned {status}: {}", error_detail(body)),
                is_retryable_status(status),
            ));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"), false)
        })?;

        let mut data = embedding_response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// A [`CompletionProvider`] backed by the OpenAI chat completions API.
///
/// The rendered prompt is sent as a single user message.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::openai::OpenAICompletionProvider;
///
/// let llm = OpenAICompletionProvider::from_env()?.with_model("gpt-4o");
/// ```
pub struct OpenAICompletionProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAICompletionProvider {
    /// Create a new provider with the given API key and the default model (`gpt-4o-mini`).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::completion(PROVIDER, "API key must not be empty", false));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = api_key_from_env().map_err(|m| RagError::completion(PROVIDER, m, false))?;
        Self::new(api_key)
    }

    /// Point the provider at an OpenAI-compatible API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletionProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = request.prompt.len(), "chat completion");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: &request.prompt }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::completion(PROVIDER, format!("request failed: {e}"), true)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::completion(
                PROVIDER,
                format!("API returned {status}: {}", error_detail(body)),
                is_retryable_status(status),
            ));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::completion(PROVIDER, format!("failed to parse response: {e}"), false)
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::completion(PROVIDER, "response contained no message", false))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_statuses_are_retryable() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn error_detail_prefers_api_message() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_detail(body.to_string()), "Incorrect API key provided");
        assert_eq!(error_detail("upstream exploded".to_string()), "upstream exploded");
    }

    #[test]
    fn embedding_data_is_reordered_by_index() {
        let json = r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#;
        let mut data = serde_json::from_str::<EmbeddingResponse>(json).unwrap().data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![1.0]);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new("").is_err());
        assert!(OpenAICompletionProvider::new("").is_err());
    }

    #[test]
    fn chat_request_is_deterministic() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.0,
            max_tokens: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["temperature"], 0.0);
        assert!(value.get("max_tokens").is_none());
    }
}
