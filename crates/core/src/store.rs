//! Story persistence trait.
//!
//! Every call is scoped by an `OwnerId`; an owner mismatch is reported as
//! `StoreError::NotFound`, indistinguishable from absence. Committed
//! episodes are append-only: there is no episode update operation.

use async_trait::async_trait;

use crate::character::Character;
use crate::chunk::Chunk;
use crate::episode::Episode;
use crate::error::StoreError;
use crate::story::{OwnerId, Story, StoryId};

/// Result alias scoped to store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The persistence boundary for stories, episodes, characters, and chunks.
///
/// Implementations: an in-memory map store for tests and ephemeral runs,
/// and a SQLite store for durable runs.
#[async_trait]
pub trait StoryStore: Send + Sync {
    // --- Stories ---

    /// Persist a new story.
    async fn create_story(&self, owner: &OwnerId, story: &Story) -> StoreResult<()>;

    /// Fetch a story by id.
    async fn get_story(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Story>;

    /// All stories belonging to the owner, newest first.
    async fn list_stories(&self, owner: &OwnerId) -> StoreResult<Vec<Story>>;

    /// Replace the stored story record (aggregates, pointer, pending
    /// batch). Fails with `NotFound` when the story does not exist for
    /// this owner.
    async fn update_story(&self, owner: &OwnerId, story: &Story) -> StoreResult<()>;

    /// Delete a story and everything attached to it.
    async fn delete_story(&self, owner: &OwnerId, id: StoryId) -> StoreResult<()>;

    // --- Episodes (committed, immutable) ---

    /// Append committed episodes.
    async fn put_episodes(
        &self,
        owner: &OwnerId,
        id: StoryId,
        episodes: &[Episode],
    ) -> StoreResult<()>;

    /// Committed episodes with numbers in `[from, to]`, ascending.
    async fn episodes_in_range(
        &self,
        owner: &OwnerId,
        id: StoryId,
        from: u32,
        to: u32,
    ) -> StoreResult<Vec<Episode>>;

    // --- Characters ---

    /// Insert or replace one character record by name.
    async fn upsert_character(
        &self,
        owner: &OwnerId,
        id: StoryId,
        character: &Character,
    ) -> StoreResult<()>;

    /// All character records for the story.
    async fn characters(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Vec<Character>>;

    // --- Chunks ---

    /// Append embedded chunks.
    async fn put_chunks(&self, owner: &OwnerId, id: StoryId, chunks: &[Chunk]) -> StoreResult<()>;

    /// Chunks belonging to the given episodes, in (episode, ordinal) order.
    async fn chunks_for_episodes(
        &self,
        owner: &OwnerId,
        id: StoryId,
        episodes: &[u32],
    ) -> StoreResult<Vec<Chunk>>;

    /// Every chunk for the story, in (episode, ordinal) order.
    async fn all_chunks(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Vec<Chunk>>;
}
