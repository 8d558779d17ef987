//! Data types for documents, chunks, index entries, search results and answers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed reply used when the document does not contain the answer.
pub const NOT_FOUND_ANSWER: &str = "Answer not found in the document.";

/// A source document (usually one page of an uploaded file).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// File name or label of the upload this document came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// One-based page number within the source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no page metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_name: None,
            page_number: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach the source file name.
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    /// Attach the page number.
    pub fn with_page_number(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    /// Length of the text in characters, the unit chunk offsets are measured in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous segment of a [`Document`]'s text.
///
/// `start` and `end` are character offsets into the parent text, so
/// `chunk.text == parent.text.chars().skip(start).take(end - start)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{chunk_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Start offset (inclusive) in characters.
    pub start: usize,
    /// End offset (exclusive) in characters.
    pub end: usize,
    /// Source file name inherited from the parent document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Page number inherited from the parent document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Parent metadata plus chunk-specific fields.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A [`Chunk`] paired with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The embedding of the chunk's text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// The reply to a question: a grounded answer or [`NOT_FOUND_ANSWER`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    /// The answer text.
    pub text: String,
}

impl Answer {
    /// Create an answer from model output.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The sentinel reply.
    pub fn not_found() -> Self {
        Self::new(NOT_FOUND_ANSWER)
    }

    /// Whether this is the sentinel reply.
    pub fn is_not_found(&self) -> bool {
        self.text == NOT_FOUND_ANSWER
    }

    /// Borrow the answer text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
