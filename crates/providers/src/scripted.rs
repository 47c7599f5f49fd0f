//! Deterministic test doubles.
//!
//! `ScriptedProvider` replays a fixed sequence of responses and records
//! every prompt it receives; `HashEmbedder` maps text to a stable vector
//! with no network. Both are exported for integration tests downstream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fableforge_core::error::ProviderError;
use fableforge_core::provider::{Completion, GenerationRequest};

/// A language model that returns pre-scripted responses in order.
///
/// When the script runs out, the last response repeats, so loops with a
/// variable number of calls stay deterministic.
pub struct ScriptedProvider {
    responses: Vec<String>,
    cursor: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "ScriptedProvider needs at least one response");
        Self {
            responses,
            cursor: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Convenience constructor from string literals.
    pub fn from_strs(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|s| s.to_string()).collect())
    }

    /// A provider that answers everything with the same response.
    pub fn always(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// How many generation calls have been made.
    pub fn call_count(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

#[async_trait]
impl fableforge_core::LanguageModel for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("prompt log poisoned").push(request.prompt);

        let text = self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();

        Ok(Completion { text, model: "scripted".into(), usage: None })
    }
}

/// A language model that always fails. For quota and error-path tests.
pub struct FailingProvider;

#[async_trait]
impl fableforge_core::LanguageModel for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        Err(ProviderError::Network("scripted failure".into()))
    }
}

/// Deterministic token-hash embedder.
///
/// Words hash into a fixed number of buckets; the vector is L2-normalized.
/// Texts sharing vocabulary land near each other, which is enough for
/// chunking and retrieval tests.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        assert!(dimension > 0, "HashEmbedder dimension must be positive");
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[async_trait]
impl fableforge_core::EmbeddingModel for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(&token.to_lowercase());
            let bucket = (hash % self.dimension as u64) as usize;
            // Sign from a second hash bit keeps buckets from saturating.
            let sign = if hash & (1 << 32) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
