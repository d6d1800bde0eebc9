//! In-memory vector index using cosine similarity.
//!
//! [`VectorIndex`] keeps `(chunk, embedding)` pairs in insertion order. The
//! insertion rank of an entry is stable and breaks ties between equal scores,
//! so identical inputs always produce identical search results.

use tracing::info;

use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};

/// A chunk stored in the index together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding.
    pub embedding: Vec<f32>,
    norm: f32,
}

/// An ordered, in-memory collection of embedded chunks.
///
/// All embeddings share one dimensionality, fixed by the first insert.
/// Once populated the index is only read, so a built index can be shared
/// behind an `Arc` without locking.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::VectorIndex;
///
/// let mut index = VectorIndex::new();
/// index.insert(chunk, vec![1.0, 0.0])?;
/// let results = index.search(&[1.0, 0.0], 3)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
}

impl VectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality of the stored embeddings, if any have been inserted.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Embed all chunks and populate the index.
    ///
    /// If the index already has entries this is a no-op: the provider is not
    /// called and the index is left unchanged. On error the index is also
    /// left unchanged. Returns the number of entries added.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures, plus [`RagError::DimensionMismatch`] or
    /// [`RagError::DegenerateVector`] for unusable vectors.
    pub async fn build(&mut self, client: &EmbeddingClient, chunks: Vec<Chunk>) -> Result<usize> {
        if !self.is_empty() {
            info!(entries = self.len(), "vector index already built, skipping");
            return Ok(0);
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = client.embed_many(texts.as_slice()).await?;

        let mut staged = Self::new();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            staged.insert(chunk, embedding)?;
        }

        let added = staged.len();
        *self = staged;
        info!(entries = added, dimensions = ?self.dimensions, "built vector index");
        Ok(added)
    }

    /// Append a single chunk and its embedding.
    ///
    /// # Errors
    ///
    /// - [`RagError::DimensionMismatch`] if the embedding length differs from
    ///   the index dimensionality.
    /// - [`RagError::DegenerateVector`] if the embedding is empty or has zero
    ///   norm.
    pub fn insert(&mut self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        if let Some(expected) = self.dimensions {
            if embedding.len() != expected {
                return Err(RagError::DimensionMismatch { expected, actual: embedding.len() });
            }
        }
        let norm = l2_norm(&embedding);
        if embedding.is_empty() || norm == 0.0 {
            return Err(RagError::DegenerateVector);
        }
        self.dimensions.get_or_insert(embedding.len());
        self.entries.push(IndexEntry { chunk, embedding, norm });
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. An empty index yields no results.
    ///
    /// # Errors
    ///
    /// - [`RagError::Configuration`] if `k == 0`.
    /// - [`RagError::DimensionMismatch`] if the query length differs from the
    ///   index dimensionality.
    /// - [`RagError::DegenerateVector`] if the query has zero norm.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(RagError::Configuration("k must be at least 1".to_string()));
        }
        let Some(expected) = self.dimensions else {
            return Ok(Vec::new());
        };
        if query.len() != expected {
            return Err(RagError::DimensionMismatch { expected, actual: query.len() });
        }
        let query_norm = l2_norm(query);
        if query_norm == 0.0 {
            return Err(RagError::DegenerateVector);
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(rank, entry)| (rank, dot(query, &entry.embedding) / (query_norm * entry.norm)))
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(rank, score)| SearchResult {
                chunk: self.entries[rank].chunk.clone(),
                score,
                rank,
            })
            .collect())
    }
}

/// Compute cosine similarity between two vectors.
///
/// # Errors
///
/// - [`RagError::DimensionMismatch`] if the lengths differ.
/// - [`RagError::DegenerateVector`] if either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(RagError::DegenerateVector);
    }
    Ok(dot(a, b) / (norm_a * norm_b))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
