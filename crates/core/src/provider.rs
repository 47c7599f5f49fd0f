//! Model provider traits: the abstraction over LLM and embedding backends.
//!
//! A `LanguageModel` turns a prompt into text with no structure guarantee;
//! structure is recovered downstream by the extraction layer. An
//! `EmbeddingModel` maps text to a fixed-dimension vector, deterministic per
//! model version.
//!
//! Implementations: Gemini native, OpenAI-compatible endpoints, scripted
//! test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Configuration for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The full rendered prompt.
    pub prompt: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A complete response from a language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text, exactly as the model produced it.
    pub text: String,

    /// Which model actually responded (may differ from requested).
    pub model: String,

    /// Token usage statistics, when the backend reports them.
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The text-generation trait every backend implements.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "scripted").
    fn name(&self) -> &str;

    /// Send a prompt and get a complete response. No JSON guarantee.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<Completion, ProviderError>;
}

/// The embedding trait. One vector per input, fixed dimension per model.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// A human-readable name for this embedder.
    fn name(&self) -> &str;

    /// Embedding dimension for this model version.
    fn dimension(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;

    /// Embed a batch of texts.
    ///
    /// Default implementation embeds sequentially; backends with a batch
    /// endpoint override this.
    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_defaults() {
        let req = GenerationRequest::new("hello");
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn request_builder_overrides() {
        let req = GenerationRequest::new("hello")
            .with_temperature(0.2)
            .with_max_tokens(512);
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(512));
    }
}
