//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] owns the index of the one document currently loaded.
//! It starts [`Unloaded`](PipelineState::Unloaded); a successful
//! [`ingest`](RagPipeline::ingest) makes it [`Ready`](PipelineState::Ready),
//! after which [`ask`](RagPipeline::ask) can be called any number of times.
//! Ingesting again discards the previous index first.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfchat_rag::{RagConfig, RagPipeline, load_document};
//!
//! let mut pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .completion_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! let documents = load_document(&bytes, "report.pdf")?;
//! pipeline.ingest(&documents).await?;
//! let answer = pipeline.ask("What was the revenue in 2023?").await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::answer::AnswerComposer;
use crate::chunking::chunker_for;
use crate::completion::CompletionProvider;
use crate::config::RagConfig;
use crate::document::{Answer, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{BuildOptions, FlatIndex, VectorIndex};
use crate::retriever::Retriever;

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    /// Identifier of the index that was built.
    pub index_id: Uuid,
    /// Number of documents (pages) that were chunked.
    pub document_count: usize,
    /// Number of chunks in the index.
    pub chunk_count: usize,
    /// Embedding dimensionality of the index.
    pub dimensions: usize,
    /// When ingest finished.
    pub ingested_at: DateTime<Utc>,
}

/// The loaded document's index and the settings it was built with.
#[derive(Debug, Clone)]
pub struct ReadySession {
    index: Arc<FlatIndex>,
    retriever: Retriever,
    composer: AnswerComposer,
    summary: IngestSummary,
}

impl ReadySession {
    /// The index built for the loaded document.
    pub fn index(&self) -> &Arc<FlatIndex> {
        &self.index
    }

    /// What ingest produced.
    pub fn summary(&self) -> &IngestSummary {
        &self.summary
    }
}

/// Whether a document is loaded.
#[derive(Debug, Clone, Default)]
pub enum PipelineState {
    /// No usable index; `ask` fails with [`RagError::NotReady`].
    #[default]
    Unloaded,
    /// A document is indexed and questions can be asked.
    Ready(ReadySession),
}

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → index) and question
/// answering (embed → search → prompt → complete). Construct one via
/// [`RagPipeline::builder()`].
///
/// `ingest` takes `&mut self` and `ask` takes `&self`, so a question can
/// never run against a half-built index.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    completion_provider: Arc<dyn CompletionProvider>,
    template: Option<String>,
    state: PipelineState,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the default configuration used by [`ingest`](Self::ingest).
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Current state.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Whether a document is loaded.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, PipelineState::Ready(_))
    }

    /// The index of the loaded document, if any.
    pub fn index(&self) -> Option<&Arc<FlatIndex>> {
        match &self.state {
            PipelineState::Ready(session) => Some(&session.index),
            PipelineState::Unloaded => None,
        }
    }

    /// Discard the loaded document.
    pub fn reset(&mut self) {
        self.state = PipelineState::Unloaded;
    }

    /// Ingest `documents` with the pipeline's configuration.
    ///
    /// See [`ingest_with`](Self::ingest_with).
    pub async fn ingest(&mut self, documents: &[Document]) -> Result<IngestSummary> {
        let config = self.config.clone();
        self.ingest_with(documents, &config, &CancellationToken::new()).await
    }

    /// Ingest `documents` (the pages of one upload): chunk → embed → index.
    ///
    /// `config` is validated before anything else happens; a
    /// [`RagError::ConfigError`] leaves the current state untouched. Otherwise
    /// any previously loaded document is discarded, and the pipeline becomes
    /// ready only if the whole ingest succeeds.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] for an invalid `config`.
    /// - [`RagError::EmptyIndex`] if the documents contain no text.
    /// - [`RagError::EmbeddingService`] if embedding fails after retries.
    /// - [`RagError::Cancelled`] if `cancel` fires.
    pub async fn ingest_with(
        &mut self,
        documents: &[Document],
        config: &RagConfig,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary> {
        config.validate()?;
        let composer = self.composer_for(config)?;
        let chunker = chunker_for(config.chunking, config.chunk_size, config.chunk_overlap)?;

        self.state = PipelineState::Unloaded;

        let chunks: Vec<_> = documents.iter().flat_map(|document| chunker.chunk(document)).collect();
        info!(
            documents = documents.len(),
            chunk_count = chunks.len(),
            chunk_size = config.chunk_size,
            chunk_overlap = config.chunk_overlap,
            "chunked documents"
        );

        let options = BuildOptions::from_config(config).with_cancellation(cancel.clone());
        let index = FlatIndex::build_with(chunks, self.embedding_provider.as_ref(), &options)
            .await
            .inspect_err(|e| error!(error = %e, "ingest failed"))?;

        let summary = IngestSummary {
            index_id: index.id(),
            document_count: documents.len(),
            chunk_count: index.len(),
            dimensions: index.dimensions(),
            ingested_at: Utc::now(),
        };
        info!(index.id = %summary.index_id, chunk_count = summary.chunk_count, "ingested document");

        self.state = PipelineState::Ready(ReadySession {
            index: Arc::new(index),
            retriever: Retriever::from_config(config),
            composer,
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Answer `question` from the loaded document.
    ///
    /// The state is unchanged whether or not the call succeeds.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotReady`] if no document is loaded.
    /// - [`RagError::InvalidInput`] if `question` is blank.
    /// - [`RagError::EmbeddingService`] / [`RagError::CompletionService`] if a
    ///   service call fails after retries.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let session = match &self.state {
            PipelineState::Ready(session) => session,
            PipelineState::Unloaded => return Err(RagError::NotReady),
        };

        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }

        let results = session
            .retriever
            .retrieve(question, session.index.as_ref(), self.embedding_provider.as_ref())
            .await?;

        session.composer.compose(question, &results, self.completion_provider.as_ref()).await
    }

    fn composer_for(&self, config: &RagConfig) -> Result<AnswerComposer> {
        let composer = AnswerComposer::from_config(config);
        match &self.template {
            Some(template) => composer.with_template(template.clone()),
            None => Ok(composer),
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding and completion providers are required. The configuration
/// defaults to [`RagConfig::default()`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::builder().chunk_size(800).build()?)
///     .embedding_provider(Arc::new(embedder))
///     .completion_provider(Arc::new(llm))
///     .prompt_template(MY_TEMPLATE)  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    template: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Replace the default prompt template.
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a provider is missing, the
    /// configuration is invalid, or the template lacks a placeholder.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::ConfigError("completion_provider is required".to_string()))?;
        if let Some(template) = &self.template {
            AnswerComposer::from_config(&config).with_template(template.clone())?;
        }

        Ok(RagPipeline {
            config,
            embedding_provider,
            completion_provider,
            template: self.template,
            state: PipelineState::Unloaded,
        })
    }
}
