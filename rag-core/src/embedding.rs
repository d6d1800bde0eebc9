//! Embedding provider trait and the bounded-concurrency client around it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI, local models,
/// test doubles) behind a unified async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Default number of batches in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Default number of texts per provider request.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Order-preserving embedding client with bounded concurrency.
///
/// Inputs are grouped into batches and at most `concurrency_limit` batches
/// are outstanding against the provider at any time. A failure in any batch
/// fails the whole call and reports every input index that was not embedded.
#[derive(Clone)]
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    concurrency_limit: usize,
    batch_size: usize,
}

impl EmbeddingClient {
    /// Create a client with the default batch size and concurrency limit.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the maximum number of in-flight provider requests (at least one).
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Set the number of texts per provider request (at least one).
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_many(std::slice::from_ref(&text)).await?;
        embeddings.pop().ok_or_else(|| RagError::EmbeddingProvider {
            provider: self.provider.name().to_string(),
            failed: vec![0],
            message: "provider returned no embedding".to_string(),
        })
    }

    /// Embed many texts, returning one embedding per input in input order.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingProvider`] if any batch failed or returned the
    ///   wrong number of vectors; `failed` lists the affected input indices.
    /// - [`RagError::DimensionMismatch`] if the provider returned vectors of
    ///   differing lengths.
    pub async fn embed_many<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = &self.provider;
        let batch_size = self.batch_size;
        debug!(
            provider = provider.name(),
            inputs = texts.len(),
            batch_size,
            concurrency_limit = self.concurrency_limit,
            "embedding texts"
        );

        // Futures are built up front so the stream holds no borrowing closure.
        let batches: Vec<_> = texts
            .chunks(batch_size)
            .enumerate()
            .map(|(batch_index, batch)| {
                let inputs: Vec<&str> = batch.iter().map(|t| t.as_ref()).collect();
                async move {
                    let result = provider.embed_batch(&inputs).await;
                    (batch_index * batch_size, inputs.len(), result)
                }
            })
            .collect();

        let outcomes: Vec<(usize, usize, Result<Vec<Vec<f32>>>)> =
            stream::iter(batches).buffered(self.concurrency_limit).collect().await;

        let mut embeddings = Vec::with_capacity(texts.len());
        let mut failed = Vec::new();
        let mut first_message: Option<String> = None;

        for (offset, len, result) in outcomes {
            match result {
                Ok(vectors) if vectors.len() == len => embeddings.extend(vectors),
                Ok(vectors) => {
                    failed.extend(offset..offset + len);
                    first_message.get_or_insert_with(|| {
                        format!("provider returned {} embeddings for {len} inputs", vectors.len())
                    });
                }
                Err(e) => {
                    failed.extend(offset..offset + len);
                    first_message.get_or_insert_with(|| e.to_string());
                }
            }
        }

        if !failed.is_empty() {
            let message = first_message.unwrap_or_default();
            error!(
                provider = provider.name(),
                failed = failed.len(),
                error = %message,
                "embedding failed"
            );
            return Err(RagError::EmbeddingProvider {
                provider: provider.name().to_string(),
                failed,
                message,
            });
        }

        if let Some(expected) = embeddings.first().map(Vec::len) {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
                return Err(RagError::DimensionMismatch { expected, actual: bad.len() });
            }
        }

        Ok(embeddings)
    }
}
