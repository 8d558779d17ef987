//! # pdfchat-rag
//!
//! Retrieval-augmented question answering over a single uploaded document.
//!
//! ## Overview
//!
//! A document is split into overlapping chunks, the chunks are embedded and
//! indexed, and each question is answered by a language model that only sees
//! the most similar chunks. When those chunks do not contain the answer the
//! model is instructed to reply with [`NOT_FOUND_ANSWER`].
//!
//! - [`EmbeddingProvider`]: text → vector (external service)
//! - [`CompletionProvider`]: prompt → text (external service)
//! - [`Chunker`]: [`RecursiveChunker`] and [`FixedSizeChunker`]
//! - [`VectorIndex`]: [`FlatIndex`], exhaustive cosine similarity
//! - [`Retriever`]: question → top-k chunks
//! - [`AnswerComposer`]: chunks + question → [`Answer`]
//! - [`RagPipeline`]: ingest once, ask many times
//!
//! ## Features
//!
//! - `openai`: [`OpenAIEmbeddingProvider`] and [`OpenAICompletionProvider`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfchat_rag::*;
//!
//! let mut pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(OpenAIEmbeddingProvider::from_env()?))
//!     .completion_provider(Arc::new(OpenAICompletionProvider::from_env()?))
//!     .build()?;
//!
//! let documents = load_document(&std::fs::read("manual.pdf")?, "manual.pdf")?;
//! pipeline.ingest(&documents).await?;
//! println!("{}", pipeline.ask("How do I reset the device?").await?);
//! ```

pub mod answer;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod retriever;
pub mod retry;

#[cfg(feature = "openai")]
pub mod openai;

pub use answer::{AnswerComposer, CONTEXT_DELIMITER, DEFAULT_TEMPLATE};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, split};
pub use completion::{CompletionProvider, CompletionRequest};
pub use config::{ChunkingStrategy, RagConfig, RagConfigBuilder};
pub use document::{Answer, Chunk, Document, IndexEntry, NOT_FOUND_ANSWER, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::{BuildOptions, FlatIndex, VectorIndex};
pub use loader::{load_document, load_pdf, load_text};
pub use pipeline::{IngestSummary, PipelineState, RagPipeline, RagPipelineBuilder, ReadySession};
pub use retriever::{DEFAULT_TOP_K, Retriever};
pub use retry::RetryPolicy;

#[cfg(feature = "openai")]
pub use openai::{OpenAICompletionProvider, OpenAIEmbeddingProvider};

pub use tokio_util::sync::CancellationToken;
