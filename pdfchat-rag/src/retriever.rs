//! Question → most similar chunks.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::retry::{RetryPolicy, Service, call_with_retry};

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Embeds a question and looks up the closest chunks in a [`VectorIndex`].
#[derive(Debug, Clone)]
pub struct Retriever {
    top_k: usize,
    similarity_threshold: Option<f32>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl Retriever {
    /// Take `top_k`, the threshold, timeout and retry policy from `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
            timeout: config.request_timeout(),
            retry: config.retry,
        }
    }

    /// The `k` used by [`retrieve`](Self::retrieve).
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the default number of chunks for `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        index: &dyn VectorIndex,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<SearchResult>> {
        self.retrieve_k(query, index, embedder, self.top_k).await
    }

    /// Retrieve up to `k` chunks for `query`, best first.
    ///
    /// When the index holds fewer than `k` chunks all of them are returned.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`.
    /// - [`RagError::EmbeddingService`] if the query cannot be embedded.
    /// - [`RagError::DimensionMismatch`] if the query vector does not fit the index.
    pub async fn retrieve_k(
        &self,
        query: &str,
        index: &dyn VectorIndex,
        embedder: &dyn EmbeddingProvider,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }

        let provider = embedder.name();
        debug!(provider, query_len = query.len(), k, "embedding query");
        let query_embedding = call_with_retry(
            &self.retry,
            self.timeout,
            Service::Embedding,
            provider,
            "embed",
            || embedder.embed(query),
        )
        .await
        .inspect_err(|e| error!(provider, error = %e, "embedding failed during query"))?;

        let results = index.query(&query_embedding, k).await?;

        let results: Vec<SearchResult> = match self.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        info!(index.id = %index.id(), result_count = results.len(), k, "retrieval completed");
        Ok(results)
    }
}
