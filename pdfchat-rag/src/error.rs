//! Error types for the `pdfchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting a document or answering a question.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error. Raised before any work starts.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Caller-supplied input was rejected (for example a blank question).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The uploaded file could not be read or decoded.
    #[error("Failed to load document '{source_name}': {message}")]
    DocumentLoad {
        /// File name or other label of the rejected input.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding service failed.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingService {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether retrying the same request may succeed.
        retryable: bool,
    },

    /// The completion service failed.
    #[error("Completion service error ({provider}): {message}")]
    CompletionService {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether retrying the same request may succeed.
        retryable: bool,
    },

    /// Ingest produced no chunks, so there is nothing to index.
    #[error("Document has no extractable text; the index would be empty")]
    EmptyIndex,

    /// A question was asked before a document was successfully ingested.
    #[error("No document is loaded; ingest a document before asking questions")]
    NotReady,

    /// A vector does not match the dimensionality of the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// Ingest was cancelled through its cancellation token.
    #[error("Ingest cancelled")]
    Cancelled,
}

impl RagError {
    /// Whether the failed operation is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingService { retryable: true, .. }
                | RagError::CompletionService { retryable: true, .. }
        )
    }

    pub(crate) fn embedding(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        RagError::EmbeddingService { provider: provider.into(), message: message.into(), retryable }
    }

    pub(crate) fn completion(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        RagError::CompletionService {
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
