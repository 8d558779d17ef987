//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: fixed-size windows that end at the nearest paragraph,
//!   sentence or word boundary
//! - [`FixedSizeChunker`]: fixed-size windows with hard cuts
//!
//! Both measure `chunk_size` and `chunk_overlap` in characters (Unicode scalar
//! values). Consecutive chunks share exactly `chunk_overlap` characters, and
//! every chunk is the exact substring `text[start..end]` of its document, so
//! the document can be rebuilt from its chunks by dropping each overlap.

use std::sync::Arc;

use crate::config::ChunkingStrategy;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document is empty or only whitespace.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Split `document` with the default [`RecursiveChunker`].
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
/// `chunk_overlap >= chunk_size`.
pub fn split(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(RecursiveChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Construct the chunker selected by `strategy`.
pub fn chunker_for(
    strategy: ChunkingStrategy,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Arc<dyn Chunker>> {
    Ok(match strategy {
        ChunkingStrategy::Recursive => Arc::new(RecursiveChunker::new(chunk_size, chunk_overlap)?),
        ChunkingStrategy::Fixed => Arc::new(FixedSizeChunker::new(chunk_size, chunk_overlap)?),
    })
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = document.text.chars().collect();
        let spans = windows(&chars, self.chunk_size, self.chunk_overlap, |_, _, hard_end| hard_end);
        build_chunks(document, &chars, spans)
    }
}

/// Splits text into windows that prefer natural boundaries.
///
/// Each window is at most `chunk_size` characters. Its end is pulled back to
/// the last paragraph break (`\n\n`) inside the tolerance region, else the last
/// sentence end (`. `, `! `, `? ` or their newline forms), else the last line
/// break, else the last whitespace. The tolerance region is the second half of
/// the window, and never reaches back into the overlap. Without any boundary
/// there the window is cut hard at `chunk_size`.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = document.text.chars().collect();
        let chunk_size = self.chunk_size;
        let chunk_overlap = self.chunk_overlap;
        let spans = windows(&chars, chunk_size, chunk_overlap, |chars, start, hard_end| {
            let min_end = (start + chunk_overlap + 1).max(start + chunk_size / 2);
            find_break_point(chars, min_end, hard_end).unwrap_or(hard_end)
        });
        build_chunks(document, &chars, spans)
    }
}

/// Boundary classes in order of preference. Each entry is the text that must
/// immediately precede the cut.
const SEPARATOR_CLASSES: &[&[&str]] =
    &[&["\n\n"], &[". ", "! ", "? ", ".\n", "!\n", "?\n"], &["\n"]];

/// Find the preferred cut position in `min_end..=hard_end`, if any.
fn find_break_point(chars: &[char], min_end: usize, hard_end: usize) -> Option<usize> {
    if min_end > hard_end {
        return None;
    }

    for class in SEPARATOR_CLASSES {
        for end in (min_end..=hard_end).rev() {
            if class.iter().any(|sep| ends_with(chars, end, sep)) {
                return Some(end);
            }
        }
    }

    // Word boundary: the cut must not fall between two non-whitespace characters.
    (min_end..=hard_end).rev().find(|&end| {
        chars[end - 1].is_whitespace() || chars.get(end).is_some_and(|c| c.is_whitespace())
    })
}

fn ends_with(chars: &[char], end: usize, separator: &str) -> bool {
    let len = separator.chars().count();
    end >= len && chars[end - len..end].iter().copied().eq(separator.chars())
}

/// Walk `chars` producing `(start, end)` windows of at most `chunk_size`.
///
/// `cut` picks the end of a window given its start and the hard limit
/// `start + chunk_size`; it must return a value in
/// `start + chunk_overlap + 1..=hard_end`. The next window starts
/// `chunk_overlap` characters before the previous end.
fn windows<F>(chars: &[char], chunk_size: usize, chunk_overlap: usize, cut: F) -> Vec<(usize, usize)>
where
    F: Fn(&[char], usize, usize) -> usize,
{
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        if len - start <= chunk_size {
            spans.push((start, len));
            break;
        }
        let hard_end = start + chunk_size;
        let end = cut(chars, start, hard_end);
        spans.push((start, end));
        start = end - chunk_overlap;
    }

    spans
}

fn build_chunks(document: &Document, chars: &[char], spans: Vec<(usize, usize)>) -> Vec<Chunk> {
    spans
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), i.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                document_id: document.id.clone(),
                text: chars[start..end].iter().collect(),
                start,
                end,
                source_name: document.source_name.clone(),
                page_number: document.page_number,
                metadata,
            }
        })
        .collect()
}
