//! Episodic memory for Fableforge.
//!
//! - **chunker**: semantic splitting and importance scoring of episode prose
//! - **vector**: cosine similarity and percentile helpers
//! - **retrieval**: importance-weighted, pin-preserving chunk retrieval
//! - **in_memory / sqlite**: `StoryStore` implementations

pub mod chunker;
pub mod in_memory;
pub mod retrieval;
pub mod sqlite;
pub mod vector;

pub use chunker::{anchor_episodes, split_sentences, SemanticChunker};
pub use in_memory::InMemoryStore;
pub use retrieval::retrieve_relevant;
pub use sqlite::SqliteStore;
pub use vector::{cosine_distance, cosine_similarity, percentile};
