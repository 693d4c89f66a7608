//! Overlapping fixed-size word windows

use crate::document::Document;
use crate::error::{CasedexError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// A contiguous window of a document's whitespace tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    /// Dense, zero-based position within the document
    pub sequence_index: usize,
    /// Tokens of the window joined by single spaces
    pub text: String,
    pub word_count: usize,
    /// First token of the window (inclusive)
    pub token_start: usize,
    /// End of the window (exclusive)
    pub token_end: usize,
}

/// Splits text into windows of `window_size` tokens advancing by
/// `window_size - overlap` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(CasedexError::Configuration(
                "chunk window size must be greater than 0".to_string(),
            ));
        }
        if overlap >= window_size {
            return Err(CasedexError::Configuration(format!(
                "chunk overlap ({}) must be smaller than window size ({})",
                overlap, window_size
            )));
        }
        Ok(Self {
            window_size,
            overlap,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn stride(&self) -> usize {
        self.window_size - self.overlap
    }

    /// Chunk `text` on behalf of `document_id`.
    ///
    /// The last window is the first one that reaches the end of the token
    /// sequence, so it may be shorter than `window_size`.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::with_capacity(tokens.len() / self.stride() + 1);
        let mut start = 0;

        loop {
            let end = (start + self.window_size).min(tokens.len());
            let window = &tokens[start..end];

            chunks.push(Chunk {
                document_id: document_id.to_string(),
                sequence_index: chunks.len(),
                text: window.join(" "),
                word_count: window.len(),
                token_start: start,
                token_end: end,
            });

            if end == tokens.len() {
                break;
            }
            start += self.stride();
        }

        tracing::debug!(
            "Chunked document {} into {} chunks ({} tokens, window {}, overlap {})",
            document_id,
            chunks.len(),
            tokens.len(),
            self.window_size,
            self.overlap
        );

        chunks
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk(&document.id, &document.raw_text)
    }

    /// Chunk many documents in parallel; output keeps document order
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Vec<Chunk>> {
        documents
            .par_iter()
            .map(|doc| self.chunk_document(doc))
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}
