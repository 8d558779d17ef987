//! Vector index over the chunks of one ingested document.
//!
//! [`VectorIndex`] is the lookup seam the [`Retriever`](crate::Retriever) talks
//! to. [`FlatIndex`] is the default implementation: an exhaustive cosine
//! similarity scan, O(n) per query, which is plenty for the few hundred to
//! few thousand chunks one document produces.

use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::{Chunk, IndexEntry, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::retry::{RetryPolicy, Service, call_with_retry};

/// A read-only similarity index.
///
/// Scores are cosine similarities in `[-1, 1]`; they are only comparable
/// between results of the same index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Unique identifier of this index instance.
    fn id(&self) -> Uuid;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the index has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality shared by every stored vector.
    fn dimensions(&self) -> usize;

    /// Return the `k` entries most similar to `query_vector`.
    ///
    /// Results are ordered by descending score; equal scores keep insertion
    /// order. Fewer than `k` results are returned when the index is smaller.
    /// A query vector with NaN or infinite values is rejected.
    async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>>;
}

/// Settings for [`FlatIndex::build_with`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Number of chunk texts per embedding request.
    pub batch_size: usize,
    /// Number of embedding requests in flight.
    pub concurrency: usize,
    /// Timeout for a single embedding request.
    pub timeout: Duration,
    /// Retry policy for transient embedding failures.
    pub retry: RetryPolicy,
    /// Checked between batches; cancelling aborts the build.
    pub cancel: CancellationToken,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl BuildOptions {
    /// Take batch size, concurrency, timeout and retry policy from `config`.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            batch_size: config.embedding_batch_size,
            concurrency: config.embedding_concurrency,
            timeout: config.request_timeout(),
            retry: config.retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to abort the build.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Brute-force cosine similarity index.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{FlatIndex, VectorIndex};
///
/// let index = FlatIndex::build(chunks, &embedder).await?;
/// let query = embedder.embed("what is the refund policy?").await?;
/// let results = index.query(&query, 4).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FlatIndex {
    id: Uuid,
    built_at: DateTime<Utc>,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Embed `chunks` with default [`BuildOptions`] and index them.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        Self::build_with(chunks, embedder, &BuildOptions::default()).await
    }

    /// Embed `chunks` in batches and index them.
    ///
    /// Batches run concurrently up to `options.concurrency`; vectors are
    /// reassembled in chunk order.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if `chunks` is empty; no embedding call is made.
    /// - [`RagError::EmbeddingService`] if a batch fails after retries, or the
    ///   provider returns the wrong number of vectors, empty vectors, vectors of
    ///   differing length, or non-finite values.
    /// - [`RagError::Cancelled`] if `options.cancel` fires before completion.
    pub async fn build_with(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        options: &BuildOptions,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if options.cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let provider = embedder.name();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let batches: Vec<&[&str]> = texts.chunks(options.batch_size.max(1)).collect();
        let batch_count = batches.len();

        let mut pending = futures::stream::iter(batches.into_iter().enumerate())
            .map(|(batch_index, batch)| async move {
                debug!(provider, batch_index, batch_size = batch.len(), "embedding batch");
                let vectors = call_with_retry(
                    &options.retry,
                    options.timeout,
                    Service::Embedding,
                    provider,
                    "embed_batch",
                    || embedder.embed_batch(batch),
                )
                .await?;
                if vectors.len() != batch.len() {
                    return Err(RagError::embedding(
                        provider,
                        format!(
                            "returned {} vectors for a batch of {} texts",
                            vectors.len(),
                            batch.len()
                        ),
                        false,
                    ));
                }
                Ok(vectors)
            })
            .buffered(options.concurrency.max(1));

        let mut embeddings = Vec::with_capacity(chunks.len());
        loop {
            let next = tokio::select! {
                biased;
                _ = options.cancel.cancelled() => {
                    warn!(provider, embedded = embeddings.len(), "index build cancelled");
                    return Err(RagError::Cancelled);
                }
                next = pending.next() => next,
            };
            match next {
                Some(batch) => embeddings.extend(batch?),
                None => break,
            }
        }
        drop(pending);

        let dimensions = check_vectors(embeddings.iter().map(Vec::as_slice))
            .map_err(|problem| RagError::embedding(provider, problem.to_string(), false))?;
        if embedder.dimensions() != 0 && embedder.dimensions() != dimensions {
            warn!(
                provider,
                reported = embedder.dimensions(),
                actual = dimensions,
                "provider returned vectors of unexpected dimensionality"
            );
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let index = Self::assemble(dimensions, entries);
        info!(index.id = %index.id, entries = index.entries.len(), dimensions, batch_count, "built index");
        Ok(index)
    }

    /// Build an index from precomputed entries.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if `entries` is empty.
    /// - [`RagError::DimensionMismatch`] if vector lengths differ.
    /// - [`RagError::InvalidInput`] for empty vectors or non-finite values.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        let dimensions = check_vectors(entries.iter().map(|e| e.embedding.as_slice())).map_err(
            |problem| match problem {
                VectorProblem::Mismatch { expected, actual, .. } => {
                    RagError::DimensionMismatch { expected, actual }
                }
                other => RagError::InvalidInput(other.to_string()),
            },
        )?;
        Ok(Self::assemble(dimensions, entries))
    }

    fn assemble(dimensions: usize, entries: Vec<IndexEntry>) -> Self {
        Self { id: Uuid::new_v4(), built_at: Utc::now(), dimensions, entries }
    }

    /// When the index was built.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// The stored entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn id(&self) -> Uuid {
        self.id
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn query(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        if query_vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }
        if query_vector.iter().any(|v| !v.is_finite()) {
            return Err(RagError::InvalidInput(
                "query vector has non-finite values".to_string(),
            ));
        }

        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, query_vector),
            })
            .collect();

        // `sort_by` is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug)]
enum VectorProblem {
    Empty { position: usize },
    Mismatch { position: usize, expected: usize, actual: usize },
    NonFinite { position: usize },
}

impl std::fmt::Display for VectorProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty { position } => write!(f, "vector {position} is empty"),
            Self::Mismatch { position, expected, actual } => {
                write!(f, "vector {position} has {actual} dimensions, expected {expected}")
            }
            Self::NonFinite { position } => write!(f, "vector {position} has non-finite values"),
        }
    }
}

/// Check that all vectors are non-empty, finite and equally long; return that length.
fn check_vectors<'a>(
    vectors: impl Iterator<Item = &'a [f32]>,
) -> std::result::Result<usize, VectorProblem> {
    let mut dimensions = None;
    for (position, vector) in vectors.enumerate() {
        if vector.is_empty() {
            return Err(VectorProblem::Empty { position });
        }
        let expected = *dimensions.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(VectorProblem::Mismatch { position, expected, actual: vector.len() });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(VectorProblem::NonFinite { position });
        }
    }
    Ok(dimensions.unwrap_or(0))
}
