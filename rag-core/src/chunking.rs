//! Sliding-window document chunking.
//!
//! Documents are cut into windows of `chunk_size` characters, each window
//! starting `chunk_size - chunk_overlap` characters after the previous one.
//! Splitting is deterministic: the same text and parameters always yield the
//! same chunks.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}@{start}`.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(1000, 200)?;
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
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        windows(&document.text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end, text))| Chunk {
                id: format!("{}@{start}", document.id),
                document_id: document.id.clone(),
                index,
                text: text.to_string(),
                start,
                end,
            })
            .collect()
    }
}

/// Split a document with the given window parameters.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
pub fn split(document: &Document, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(FixedSizeChunker::new(chunk_size, chunk_overlap)?.chunk(document))
}

/// Split raw text into `(start, end, text)` windows, offsets in characters.
///
/// # Errors
///
/// Same as [`split`].
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<(usize, usize, &str)>> {
    validate(chunk_size, chunk_overlap)?;
    Ok(windows(text, chunk_size, chunk_overlap))
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Configuration("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Parameters must already be validated.
fn windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize, &str)> {
    // Byte offset of every char boundary, including the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_len = boundaries.len() - 1;
    let step = chunk_size - chunk_overlap;

    let mut out = Vec::new();
    let mut start = 0;
    while start < char_len {
        let end = (start + chunk_size).min(char_len);
        out.push((start, end, &text[boundaries[start]..boundaries[end]]));
        if end == char_len {
            break;
        }
        start += step;
    }
    out
}
