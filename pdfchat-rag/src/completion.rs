//! Completion provider trait for sending a rendered prompt to a language model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single non-streaming completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// The fully rendered prompt.
    pub prompt: String,
    /// Sampling temperature. The pipeline always sends `0.0`.
    pub temperature: f32,
    /// Optional cap on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a deterministic request (temperature `0.0`) for `prompt`.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), temperature: 0.0, max_tokens: None }
    }

    /// Cap the number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A language model that turns a prompt into response text.
///
/// Failures are reported as [`RagError::CompletionService`](crate::RagError::CompletionService)
/// with `retryable` set for transient conditions.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Return the raw response text for `request`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Short provider label used in logs and error messages.
    fn name(&self) -> &str {
        "completion"
    }
}
