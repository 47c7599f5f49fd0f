//! Model provider implementations for Fableforge.
//!
//! All providers implement the `fableforge_core::LanguageModel` or
//! `fableforge_core::EmbeddingModel` traits. The CLI selects a provider
//! based on configuration.

pub mod gemini;
pub mod openai_compat;
pub mod scripted;

pub use gemini::{GeminiEmbedder, GeminiProvider};
pub use openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};
pub use scripted::{FailingProvider, HashEmbedder, ScriptedProvider};
