//! In-memory retrieval engine for grounding a chat assistant in a fixed corpus.
//!
//! This crate provides:
//! - Sliding-window chunking of source documents
//! - A bounded-concurrency embedding client over pluggable providers
//! - An in-memory cosine-similarity vector index
//! - A retrieval pipeline that builds its index exactly once and answers
//!   queries with retrieved context, falling back to a plain prompt when
//!   retrieval is unavailable
//!
//! Enable the `openai` feature for OpenAI-compatible embedding and chat
//! providers.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod telemetry;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, FixedSizeChunker, split, split_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{ProviderFailureKind, RagError, Result};
pub use generation::{GenerationParams, GenerationProvider, Message, Role};
pub use index::{IndexEntry, VectorIndex, cosine_similarity};
pub use loader::{CorpusSource, StaticCorpus, TextFileLoader};
pub use pipeline::{Answer, AnswerMode, RagPipeline, RagPipelineBuilder};
pub use prompt::PromptTemplate;
pub use telemetry::init_tracing;
