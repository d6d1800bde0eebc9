//! Retrieval pipeline orchestrator.
//!
//! The [`RagPipeline`] owns its vector index and coordinates the whole
//! workflow: load → chunk → embed → index once, then for every query
//! embed → search → prompt → generate.
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_core::{RagPipeline, RagConfig, TextFileLoader, GenerationParams};
//!
//! let pipeline = Arc::new(
//!     RagPipeline::builder()
//!         .config(RagConfig::default())
//!         .corpus(Arc::new(TextFileLoader::new("data/")))
//!         .embedding_provider(Arc::new(my_embedder))
//!         .generation_provider(Arc::new(my_chat_model))
//!         .build()?,
//! );
//!
//! pipeline.initialize().await.ok();
//! let params = GenerationParams::default();
//! let answer = pipeline.answer("How do I handle stress?", None, &params).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, SearchResult};
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{GenerationParams, GenerationProvider, Message};
use crate::index::VectorIndex;
use crate::loader::CorpusSource;
use crate::prompt::{
    FALLBACK_SYSTEM_PROMPT, PromptTemplate, format_context, format_scores, rag_system_template,
    rag_user_template,
};

/// How an answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// The reply was conditioned on retrieved context.
    Grounded,
    /// No context was available; the fallback prompt was used.
    Fallback,
}

/// A generated reply together with the context it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generated reply.
    pub reply: String,
    /// Retrieved chunks and scores, most similar first.
    pub context: Vec<SearchResult>,
    /// Whether retrieval contributed to the reply.
    pub mode: AnswerMode,
}

/// The retrieval pipeline orchestrator.
///
/// Construct one per process via [`RagPipeline::builder()`] and share it as
/// `Arc<RagPipeline>`. The index is built at most once: by an explicit
/// [`initialize`](RagPipeline::initialize) at startup or lazily by the first
/// request. Concurrent first requests wait for a single build instead of each
/// embedding the corpus.
pub struct RagPipeline {
    config: RagConfig,
    corpus: Arc<dyn CorpusSource>,
    embedder: EmbeddingClient,
    generator: Arc<dyn GenerationProvider>,
    chunker: FixedSizeChunker,
    system_template: PromptTemplate,
    user_template: PromptTemplate,
    fallback_system_prompt: String,
    index: OnceLock<Arc<VectorIndex>>,
    build_failure: OnceLock<RagError>,
    build_lock: Mutex<()>,
    failed_builds: AtomicUsize,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Whether a build has completed successfully.
    pub fn is_ready(&self) -> bool {
        self.index.get().is_some()
    }

    /// The built index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotReady`] before a successful build.
    pub fn index(&self) -> Result<Arc<VectorIndex>> {
        self.index.get().cloned().ok_or(RagError::IndexNotReady)
    }

    /// Load, chunk and index the corpus unless that already happened.
    ///
    /// Only one build runs at a time. Callers that were waiting on a build
    /// that failed get [`RagError::IndexNotReady`] instead of starting
    /// another one; the next call after that retries. A build that fails
    /// with a non-retryable error (see [`RagError::is_retryable`]) is never
    /// attempted again and every later call returns that error.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors from the build.
    pub async fn initialize(&self) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.index.get() {
            return Ok(index.clone());
        }
        if let Some(e) = self.build_failure.get() {
            return Err(e.clone());
        }

        let failures_seen = self.failed_builds.load(Ordering::SeqCst);
        let _guard = self.build_lock.lock().await;

        if let Some(index) = self.index.get() {
            return Ok(index.clone());
        }
        if let Some(e) = self.build_failure.get() {
            return Err(e.clone());
        }
        if self.failed_builds.load(Ordering::SeqCst) != failures_seen {
            return Err(RagError::IndexNotReady);
        }

        match self.build_index().await {
            Ok(index) => Ok(self.index.get_or_init(|| index).clone()),
            Err(e) if e.is_retryable() => {
                self.failed_builds.fetch_add(1, Ordering::SeqCst);
                error!(error = %e, "vector index build failed, will retry on next request");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "vector index build failed permanently");
                Err(self.build_failure.get_or_init(|| e).clone())
            }
        }
    }

    async fn build_index(&self) -> Result<Arc<VectorIndex>> {
        let documents = match self.corpus.load().await {
            Ok(documents) => documents,
            Err(e) => {
                warn!(error = %e, "corpus could not be loaded, continuing with an empty corpus");
                Vec::new()
            }
        };

        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        info!(documents = documents.len(), chunks = chunks.len(), "chunked corpus");

        let mut index = VectorIndex::new();
        index.build(&self.embedder, chunks).await?;
        Ok(Arc::new(index))
    }

    /// Embed the query and return the `k` most similar chunks.
    ///
    /// Builds the index first if needed. An empty index yields no results.
    ///
    /// # Errors
    ///
    /// Propagates build, embedding, timeout and search errors.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let index = self.initialize().await?;
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embed_query(query).await?;
        index.search(&embedding, k)
    }

    /// Answer a query, grounded in retrieved context when possible.
    ///
    /// `k` defaults to the configured `top_k`. When the index cannot be
    /// built, is empty, or the query cannot be embedded, the reply comes
    /// from the fallback prompt and [`Answer::mode`] is
    /// [`AnswerMode::Fallback`].
    ///
    /// # Errors
    ///
    /// - [`RagError::Configuration`] if `k == 0`.
    /// - [`RagError::Timeout`] if the query embedding or generation call
    ///   exceeds the configured request timeout.
    /// - [`RagError::GenerationProvider`] if the reply cannot be generated.
    ///
    /// A query embedding that is degenerate or does not match the index
    /// dimensionality is logged and answered in fallback mode.
    pub async fn answer(
        &self,
        query: &str,
        k: Option<usize>,
        params: &GenerationParams,
    ) -> Result<Answer> {
        let k = k.unwrap_or(self.config.top_k);
        if k == 0 {
            return Err(RagError::Configuration("k must be at least 1".to_string()));
        }

        let context = match self.initialize().await {
            Ok(index) if index.is_empty() => {
                warn!("vector index is empty, answering without context");
                Vec::new()
            }
            Ok(index) => match self.embed_query(query).await {
                Ok(embedding) => index.search(&embedding, k).unwrap_or_else(|e| {
                    warn!(error = %e, "query does not fit the index, answering without context");
                    Vec::new()
                }),
                Err(e @ RagError::Timeout { .. }) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "query embedding failed, answering without context");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "vector index unavailable, answering without context");
                Vec::new()
            }
        };

        let (messages, mode) = if context.is_empty() {
            (self.fallback_messages(query), AnswerMode::Fallback)
        } else {
            (self.grounded_messages(query, &context)?, AnswerMode::Grounded)
        };

        let reply = self.generate(&messages, params).await?;
        info!(?mode, context = context.len(), reply_len = reply.len(), "answered query");

        Ok(Answer { reply, context, mode })
    }

    /// Build the system and user messages for a grounded answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Prompt`] if a template cannot be rendered.
    pub fn grounded_messages(&self, query: &str, context: &[SearchResult]) -> Result<Vec<Message>> {
        let system = self.system_template.format(&HashMap::<&str, String>::new())?;

        let mut params: HashMap<&str, String> = HashMap::from([
            ("user_query", query.to_string()),
            ("context", format_context(context)),
            ("context_count", context.len().to_string()),
        ]);
        if self.config.include_scores {
            params.insert("similarity_scores", format_scores(context));
        }
        let user = self.user_template.format(&params)?;

        Ok(vec![Message::system(system), Message::user(user)])
    }

    /// The messages used when no context is available.
    pub fn fallback_messages(&self, query: &str) -> Vec<Message> {
        vec![Message::system(self.fallback_system_prompt.clone()), Message::user(query)]
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.with_timeout("query embedding", self.embedder.embed_one(query)).await
    }

    async fn generate(&self, messages: &[Message], params: &GenerationParams) -> Result<String> {
        self.with_timeout("generation", self.generator.complete(messages, params))
            .await
            .inspect_err(|e| {
                error!(provider = self.generator.name(), error = %e, "generation failed")
            })
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let after = self.config.request_timeout;
        tokio::time::timeout(after, future)
            .await
            .map_err(|_| RagError::Timeout { operation, after })?
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `corpus`, `embedding_provider` and `generation_provider` are
/// required. The prompts default to the grounded-coach templates in
/// [`crate::prompt`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .corpus(Arc::new(StaticCorpus::from_texts(["..."])))
///     .embedding_provider(Arc::new(embedder))
///     .generation_provider(Arc::new(chat))
///     .system_template(PromptTemplate::new("Only use the context."))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    corpus: Option<Arc<dyn CorpusSource>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    system_template: Option<PromptTemplate>,
    user_template: Option<PromptTemplate>,
    fallback_system_prompt: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the corpus source.
    pub fn corpus(mut self, corpus: Arc<dyn CorpusSource>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Replace the grounded system prompt.
    pub fn system_template(mut self, template: PromptTemplate) -> Self {
        self.system_template = Some(template);
        self
    }

    /// Replace the grounded user prompt. It receives `user_query`, `context`,
    /// `context_count` and, when scores are enabled, `similarity_scores`.
    pub fn user_template(mut self, template: PromptTemplate) -> Self {
        self.user_template = Some(template);
        self
    }

    /// Replace the system prompt used when no context is available.
    pub fn fallback_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.fallback_system_prompt = Some(prompt.into());
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if any required field is missing or
    /// the configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self
            .config
            .ok_or_else(|| RagError::Configuration("config is required".to_string()))?;
        config.validate()?;
        let corpus =
            self.corpus.ok_or_else(|| RagError::Configuration("corpus is required".to_string()))?;
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::Configuration("embedding_provider is required".to_string())
        })?;
        let generator = self.generation_provider.ok_or_else(|| {
            RagError::Configuration("generation_provider is required".to_string())
        })?;

        let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?;
        let embedder = EmbeddingClient::new(embedding_provider)
            .with_batch_size(config.embedding_batch_size)
            .with_concurrency_limit(config.concurrency_limit);

        Ok(RagPipeline {
            config,
            corpus,
            embedder,
            generator,
            chunker,
            system_template: self.system_template.unwrap_or_else(rag_system_template),
            user_template: self.user_template.unwrap_or_else(rag_user_template),
            fallback_system_prompt: self
                .fallback_system_prompt
                .unwrap_or_else(|| FALLBACK_SYSTEM_PROMPT.to_string()),
            index: OnceLock::new(),
            build_failure: OnceLock::new(),
            build_lock: Mutex::new(()),
            failed_builds: AtomicUsize::new(0),
        })
    }
}
