//! Configuration for the retrieval pipeline.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of top results to retrieve for each query.
    pub top_k: usize,
    /// Maximum number of embedding requests in flight at once.
    pub concurrency_limit: usize,
    /// Number of texts sent to the embedding provider per request.
    pub embedding_batch_size: usize,
    /// Limit applied to each per-request provider call.
    pub request_timeout: Duration,
    /// Whether similarity scores are shown next to context chunks in the prompt.
    pub include_scores: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            concurrency_limit: 4,
            embedding_batch_size: 32,
            request_timeout: Duration::from_secs(30),
            include_scores: true,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a configuration from `RAG_*` environment variables layered over
    /// the defaults.
    ///
    /// Recognised variables: `RAG_CHUNK_SIZE`, `RAG_CHUNK_OVERLAP`,
    /// `RAG_TOP_K`, `RAG_CONCURRENCY_LIMIT`, `RAG_EMBEDDING_BATCH_SIZE`,
    /// `RAG_REQUEST_TIMEOUT_SECS` and `RAG_INCLUDE_SCORES`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a variable cannot be parsed or
    /// the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(v) = parse_var(&lookup, "RAG_CHUNK_SIZE")? {
            builder = builder.chunk_size(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_TOP_K")? {
            builder = builder.top_k(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_CONCURRENCY_LIMIT")? {
            builder = builder.concurrency_limit(v);
        }
        if let Some(v) = parse_var(&lookup, "RAG_EMBEDDING_BATCH_SIZE")? {
            builder = builder.embedding_batch_size(v);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RAG_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(v) = parse_var(&lookup, "RAG_INCLUDE_SCORES")? {
            builder = builder.include_scores(v);
        }
        builder.build()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k`, `concurrency_limit` or `embedding_batch_size` is zero
    /// - `request_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        if self.concurrency_limit == 0 {
            return Err(RagError::Configuration(
                "concurrency_limit must be greater than zero".to_string(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::Configuration(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(RagError::Configuration(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| {
                RagError::Configuration(format!("invalid value for {key} ('{raw}'): {e}"))
            }),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of top results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum number of in-flight embedding requests.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Set how many texts go into a single embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the per-request provider timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Show or hide similarity scores in the assembled prompt.
    pub fn include_scores(mut self, include: bool) -> Self {
        self.config.include_scores = include;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_rejects_overlap_not_below_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn builder_rejects_zero_limits() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().concurrency_limit(0).build().is_err());
        assert!(RagConfig::builder().embedding_batch_size(0).build().is_err());
        assert!(RagConfig::builder().request_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RAG_CHUNK_SIZE", "500"),
            ("RAG_CHUNK_OVERLAP", "50"),
            ("RAG_TOP_K", "3"),
            ("RAG_REQUEST_TIMEOUT_SECS", "5"),
            ("RAG_INCLUDE_SCORES", "false"),
        ]);
        let config = RagConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(!config.include_scores);
        assert_eq!(config.concurrency_limit, RagConfig::default().concurrency_limit);
    }

    #[test]
    fn env_rejects_unparsable_values() {
        let err = RagConfig::from_lookup(|k| (k == "RAG_TOP_K").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("RAG_TOP_K"));
    }
}
