//! # fableforge-core
//!
//! Core domain types and traits for the Fableforge story engine:
//!
//! - **story / episode / character / chunk**: the domain model
//! - **provider**: language-model and embedding-model traits
//! - **store**: the persistence trait, owner-scoped
//! - **quota**: the generation gate trait
//! - **extract**: layered recovery of structured model output
//! - **error**: bounded-context error types
//!
//! This crate holds no I/O. Backends live in `fableforge-providers` and
//! `fableforge-memory`; orchestration lives in `fableforge-engine`.

pub mod character;
pub mod chunk;
pub mod episode;
pub mod error;
pub mod extract;
pub mod provider;
pub mod quota;
pub mod store;
pub mod story;

pub use character::{Character, Milestone, MILESTONE_CAP};
pub use chunk::Chunk;
pub use episode::{CharacterSnapshot, Episode, EpisodeFeedback, EventTier, FeedbackItem, KeyEvent};
pub use error::{
    Error, ExtractError, PlannerError, ProviderError, QuotaError, Result, StoreError,
};
pub use extract::{extract_object, ExtractRoute, Extracted};
pub use provider::{Completion, EmbeddingModel, GenerationRequest, LanguageModel, Usage};
pub use quota::{GenerationGate, UnlimitedGate};
pub use store::{StoreResult, StoryStore};
pub use story::{
    Language, OwnerId, Phase, PhaseSegment, Protagonist, RefinementMode, Story, StoryId,
    TimelineEntry,
};
