//! Deterministic test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rag_core::{
    EmbeddingProvider, GenerationParams, GenerationProvider, Message, ProviderFailureKind,
    RagError, Result,
};

/// Hash-based embeddings, with optional fixed vectors for chosen texts.
///
/// Records every text it is asked to embed. Batch calls are numbered from
/// zero; failures and delays can be injected for chosen calls.
pub struct MockEmbeddingProvider {
    dimensions: usize,
    table: HashMap<String, Vec<f32>>,
    delay: Option<Duration>,
    delay_on: HashMap<usize, Duration>,
    fail_first: usize,
    fail_on: Vec<usize>,
    batch_calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            table: HashMap::new(),
            delay: None,
            delay_on: HashMap::new(),
            fail_first: 0,
            fail_on: Vec::new(),
            batch_calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimensions);
        self.table.insert(text.to_string(), vector);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only the given batch call.
    pub fn with_delay_on(mut self, call: usize, delay: Duration) -> Self {
        self.delay_on.insert(call, delay);
        self
    }

    pub fn failing_first(mut self, calls: usize) -> Self {
        self.fail_first = calls;
        self
    }

    /// Fail only the given batch call.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on.push(call);
        self
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn times_embedded(&self, text: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|t| t.as_str() == text).count()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.table.get(text) {
            return v.clone();
        }
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb: Vec<f32> =
            (0..self.dimensions).map(|i| ((hash.wrapping_add(i as u64)) as f32).sin()).collect();
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        } else {
            emb[0] = 1.0;
        }
        emb
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_batch(&[text]).await?.remove(0))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay_on.get(&call).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        if call < self.fail_first || self.fail_on.contains(&call) {
            return Err(RagError::EmbeddingProvider {
                provider: "mock".into(),
                failed: (0..texts.len()).collect(),
                message: "injected failure".into(),
            });
        }
        self.seen.lock().unwrap().extend(texts.iter().map(|t| t.to_string()));
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Replies with a fixed string and records every conversation it receives.
pub struct RecordingGenerator {
    reply: String,
    failure: Option<ProviderFailureKind>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self { reply: reply.to_string(), failure: None, delay: None, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(kind: ProviderFailureKind) -> Self {
        Self { failure: Some(kind), ..Self::new("") }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Vec<Message> {
        self.calls.lock().unwrap().last().cloned().expect("generator was never called")
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn complete(&self, messages: &[Message], _params: &GenerationParams) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.failure {
            Some(kind) => Err(RagError::GenerationProvider {
                provider: "recording".into(),
                kind,
                message: "injected failure".into(),
            }),
            None => Ok(self.reply.clone()),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
