//! Configuration for the RAG pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// Which [`Chunker`](crate::Chunker) the pipeline uses at ingest time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// [`RecursiveChunker`](crate::RecursiveChunker): cut at paragraph, sentence or word boundaries.
    #[default]
    Recursive,
    /// [`FixedSizeChunker`](crate::FixedSizeChunker): always cut at `chunk_size`.
    Fixed,
}

/// Configuration parameters for the RAG pipeline.
///
/// Sizes are measured in characters (Unicode scalar values), not tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunking strategy.
    pub chunking: ChunkingStrategy,
    /// Number of chunks retrieved per question.
    #[serde(alias = "retrieval_k")]
    pub top_k: usize,
    /// Results scoring below this are dropped. `None` keeps everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// Sampling temperature of the completion call. Must be `0.0`.
    pub completion_temperature: f32,
    /// Upper bound on answer length, passed through to the completion service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_answer_tokens: Option<u32>,
    /// Number of chunk texts per embedding request during ingest.
    pub embedding_batch_size: usize,
    /// Number of embedding requests in flight during ingest.
    pub embedding_concurrency: usize,
    /// Timeout applied to every embedding and completion call, in milliseconds.
    pub request_timeout_ms: u64,
    /// Retry policy for transient service failures.
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            chunking: ChunkingStrategy::Recursive,
            top_k: 4,
            similarity_threshold: None,
            completion_temperature: 0.0,
            max_answer_tokens: None,
            embedding_batch_size: 64,
            embedding_concurrency: 4,
            request_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Per-call timeout for service requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `completion_temperature` is not `0.0`
    /// - `similarity_threshold` is not finite
    /// - batch size, concurrency, timeout or retry attempts are zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.completion_temperature != 0.0 {
            return Err(RagError::ConfigError(format!(
                "completion_temperature is fixed at 0, got {}",
                self.completion_temperature
            )));
        }
        if let Some(threshold) = self.similarity_threshold {
            if !threshold.is_finite() {
                return Err(RagError::ConfigError(
                    "similarity_threshold must be a finite number".to_string(),
                ));
            }
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.embedding_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embedding_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(RagError::ConfigError(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
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

    /// Set the chunking strategy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity score for retrieved chunks.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the completion temperature. Only `0.0` passes validation.
    pub fn completion_temperature(mut self, temperature: f32) -> Self {
        self.config.completion_temperature = temperature;
        self
    }

    /// Cap the number of tokens the completion service may generate.
    pub fn max_answer_tokens(mut self, tokens: u32) -> Self {
        self.config.max_answer_tokens = Some(tokens);
        self
    }

    /// Set the number of texts per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the number of concurrent embedding requests during ingest.
    pub fn embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embedding_concurrency = concurrency;
        self
    }

    /// Set the per-call timeout for service requests.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry policy for transient service failures.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
