//! Error types for the `rag-core` crate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Broad category of an upstream provider failure.
///
/// Used to give callers a clear, user-presentable reason instead of a raw
/// provider message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailureKind {
    /// The account ran out of quota or billing is not set up.
    Quota,
    /// The credentials were rejected.
    Authentication,
    /// Too many requests in a short period.
    RateLimit,
    /// Network trouble or a server-side failure that may succeed on retry.
    Transient,
    /// Anything else.
    Other,
}

impl ProviderFailureKind {
    /// Classify a failure from an HTTP status code and the response body.
    pub fn classify(status: Option<u16>, detail: &str) -> Self {
        let lower = detail.to_lowercase();
        if lower.contains("insufficient_quota") || lower.contains("quota") {
            return Self::Quota;
        }
        match status {
            Some(401) | Some(403) => Self::Authentication,
            Some(429) => Self::RateLimit,
            Some(code) if code >= 500 => Self::Transient,
            _ if lower.contains("invalid api key") || lower.contains("unauthorized") => {
                Self::Authentication
            }
            _ if lower.contains("rate limit") => Self::RateLimit,
            _ => Self::Other,
        }
    }

    /// A fixed message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Quota => {
                "The model provider quota is exhausted. Check the account billing and usage limits."
            }
            Self::Authentication => {
                "The model provider rejected the API key. Check the key configuration."
            }
            Self::RateLimit => {
                "The model provider is rate limiting requests. Wait a moment and try again."
            }
            Self::Transient => "The model provider is temporarily unavailable. Try again shortly.",
            Self::Other => "The model provider returned an unexpected error.",
        }
    }
}

impl fmt::Display for ProviderFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Quota => "quota",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate-limit",
            Self::Transient => "transient",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in retrieval operations.
#[derive(Debug, Clone, Error)]
pub enum RagError {
    /// Invalid chunking, search, or pipeline parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The embedding provider failed for some or all inputs.
    #[error("Embedding error ({provider}): {message} (failed inputs: {failed:?})")]
    EmbeddingProvider {
        /// The embedding provider that produced the error.
        provider: String,
        /// Indices of the inputs whose embeddings could not be produced.
        failed: Vec<usize>,
        /// A description of the failure.
        message: String,
    },

    /// Two vectors of different lengths were compared or mixed in one index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality already established.
        expected: usize,
        /// The dimensionality of the offending vector.
        actual: usize,
    },

    /// A zero-norm vector makes cosine similarity undefined.
    #[error("Degenerate vector: cosine similarity is undefined for a zero-norm vector")]
    DegenerateVector,

    /// The generation provider failed.
    #[error("Generation error ({provider}, {kind}): {message}")]
    GenerationProvider {
        /// The generation provider that produced the error.
        provider: String,
        /// The failure category.
        kind: ProviderFailureKind,
        /// A description of the failure.
        message: String,
    },

    /// Search was attempted before any successful index build.
    #[error("Index not ready: no successful build has completed")]
    IndexNotReady,

    /// A per-request provider call did not finish in time.
    #[error("Timed out after {after:?} during {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured limit.
        after: Duration,
    },

    /// A prompt template could not be instantiated.
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The corpus could not be read.
    #[error("Loader error ({source_id}): {message}")]
    Loader {
        /// The file or source that failed.
        source_id: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// Returns the failure category for provider errors.
    pub fn failure_kind(&self) -> Option<ProviderFailureKind> {
        match self {
            Self::GenerationProvider { kind, .. } => Some(*kind),
            Self::Timeout { .. } => Some(ProviderFailureKind::Transient),
            _ => None,
        }
    }

    /// Whether the same operation may succeed if attempted again.
    ///
    /// Provider, timeout and loader failures are retryable. Configuration,
    /// prompt and index-math errors are not: the same inputs fail the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingProvider { .. }
                | Self::GenerationProvider { .. }
                | Self::Timeout { .. }
                | Self::Loader { .. }
                | Self::IndexNotReady
        )
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
