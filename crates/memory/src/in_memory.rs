//! In-memory story store.
//!
//! Backed by a `tokio::sync::RwLock` over plain maps. Used by tests and
//! ephemeral runs; durable runs use the SQLite store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use fableforge_core::error::StoreError;
use fableforge_core::store::{StoreResult, StoryStore};
use fableforge_core::story::{OwnerId, Story, StoryId};
use fableforge_core::{Character, Chunk, Episode};
use tokio::sync::RwLock;

struct StoryRecord {
    story: Story,
    episodes: BTreeMap<u32, Episode>,
    characters: BTreeMap<String, Character>,
    chunks: Vec<Chunk>,
}

impl StoryRecord {
    fn new(story: Story) -> Self {
        Self {
            story,
            episodes: BTreeMap::new(),
            characters: BTreeMap::new(),
            chunks: Vec::new(),
        }
    }
}

/// An in-memory `StoryStore`.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<(String, StoryId), StoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(owner: &OwnerId, id: StoryId) -> (String, StoryId) {
        (owner.0.clone(), id)
    }

    fn not_found(id: StoryId) -> StoreError {
        StoreError::NotFound(format!("story {id}"))
    }
}

#[async_trait]
impl StoryStore for InMemoryStore {
    async fn create_story(&self, owner: &OwnerId, story: &Story) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records.insert(Self::key(owner, story.id), StoryRecord::new(story.clone()));
        Ok(())
    }

    async fn get_story(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Story> {
        let records = self.records.read().await;
        records
            .get(&Self::key(owner, id))
            .map(|r| r.story.clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn list_stories(&self, owner: &OwnerId) -> StoreResult<Vec<Story>> {
        let records = self.records.read().await;
        let mut stories: Vec<Story> = records
            .iter()
            .filter(|((o, _), _)| o == &owner.0)
            .map(|(_, r)| r.story.clone())
            .collect();
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stories)
    }

    async fn update_story(&self, owner: &OwnerId, story: &Story) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&Self::key(owner, story.id))
            .ok_or_else(|| Self::not_found(story.id))?;
        record.story = story.clone();
        Ok(())
    }

    async fn delete_story(&self, owner: &OwnerId, id: StoryId) -> StoreResult<()> {
        let mut records = self.records.write().await;
        records
            .remove(&Self::key(owner, id))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn put_episodes(
        &self,
        owner: &OwnerId,
        id: StoryId,
        episodes: &[Episode],
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        for episode in episodes {
            record.episodes.insert(episode.number, episode.clone());
        }
        Ok(())
    }

    async fn episodes_in_range(
        &self,
        owner: &OwnerId,
        id: StoryId,
        from: u32,
        to: u32,
    ) -> StoreResult<Vec<Episode>> {
        let records = self.records.read().await;
        let record = records
            .get(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        Ok(record
            .episodes
            .range(from..=to)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn upsert_character(
        &self,
        owner: &OwnerId,
        id: StoryId,
        character: &Character,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        record
            .characters
            .insert(character.name.clone(), character.clone());
        Ok(())
    }

    async fn characters(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Vec<Character>> {
        let records = self.records.read().await;
        let record = records
            .get(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        Ok(record.characters.values().cloned().collect())
    }

    async fn put_chunks(&self, owner: &OwnerId, id: StoryId, chunks: &[Chunk]) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        record.chunks.extend_from_slice(chunks);
        record.chunks.sort_by_key(|c| c.position());
        Ok(())
    }

    async fn chunks_for_episodes(
        &self,
        owner: &OwnerId,
        id: StoryId,
        episodes: &[u32],
    ) -> StoreResult<Vec<Chunk>> {
        let records = self.records.read().await;
        let record = records
            .get(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        Ok(record
            .chunks
            .iter()
            .filter(|c| episodes.contains(&c.episode_number))
            .cloned()
            .collect())
    }

    async fn all_chunks(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Vec<Chunk>> {
        let records = self.records.read().await;
        let record = records
            .get(&Self::key(owner, id))
            .ok_or_else(|| Self::not_found(id))?;
        Ok(record.chunks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn story(num_episodes: u32) -> Story {
        let now = Utc::now();
        Story {
            id: StoryId::new(),
            title: "Test".into(),
            genre: String::new(),
            summary: None,
            settings: BTreeMap::new(),
            protagonists: vec![],
            special_instructions: String::new(),
            theme: String::new(),
            num_episodes,
            current_episode: 1,
            outline: vec![],
            key_events: BTreeSet::new(),
            timeline: vec![],
            pending_batch: vec![],
            is_completed: false,
            language: Default::default(),
            refinement: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_get_update_delete_roundtrip() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("o1");
        let mut s = story(5);
        store.create_story(&owner, &s).await.unwrap();

        let fetched = store.get_story(&owner, s.id).await.unwrap();
        assert_eq!(fetched.num_episodes, 5);

        s.current_episode = 3;
        store.update_story(&owner, &s).await.unwrap();
        assert_eq!(store.get_story(&owner, s.id).await.unwrap().current_episode, 3);

        store.delete_story(&owner, s.id).await.unwrap();
        assert!(matches!(
            store.get_story(&owner, s.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn owner_mismatch_reads_as_not_found() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("o1");
        let intruder = OwnerId::new("o2");
        let s = story(3);
        store.create_story(&owner, &s).await.unwrap();

        assert!(matches!(
            store.get_story(&intruder, s.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_story(&intruder, s.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.list_stories(&intruder).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn episode_range_is_inclusive_and_ordered() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("o1");
        let s = story(6);
        store.create_story(&owner, &s).await.unwrap();

        let episodes: Vec<Episode> = (1..=5).map(Episode::placeholder).collect();
        store.put_episodes(&owner, s.id, &episodes).await.unwrap();

        let range = store.episodes_in_range(&owner, s.id, 2, 4).await.unwrap();
        let numbers: Vec<u32> = range.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn reput_episode_overwrites_by_number() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("o1");
        let s = story(3);
        store.create_story(&owner, &s).await.unwrap();

        let mut ep = Episode::placeholder(1);
        ep.content = "first landing".into();
        store.put_episodes(&owner, s.id, &[ep.clone()]).await.unwrap();
        ep.content = "second landing".into();
        store.put_episodes(&owner, s.id, &[ep]).await.unwrap();

        let range = store.episodes_in_range(&owner, s.id, 1, 1).await.unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].content, "second landing");
    }

    #[tokio::test]
    async fn characters_upsert_by_name() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("o1");
        let s = story(3);
        store.create_story(&owner, &s).await.unwrap();

        let mut c = Character::new("Mira");
        store.upsert_character(&owner, s.id, &c).await.unwrap();
        c.emotional_state = "angry".into();
        store.upsert_character(&owner, s.id, &c).await.unwrap();

        let characters = store.characters(&owner, s.id).await.unwrap();
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].emotional_state, "angry");
    }

    #[tokio::test]
    async fn chunks_keep_story_order() {
        let store = InMemoryStore::new();
        let owner = OwnerId::new("o1");
        let s = story(3);
        store.create_story(&owner, &s).await.unwrap();

        let mk = |episode, ordinal| Chunk {
            story_id: s.id,
            episode_number: episode,
            ordinal,
            content: String::new(),
            embedding: vec![],
            importance: 0.0,
            characters: vec![],
        };
        store.put_chunks(&owner, s.id, &[mk(2, 0), mk(2, 1)]).await.unwrap();
        store.put_chunks(&owner, s.id, &[mk(1, 0)]).await.unwrap();

        let all = store.all_chunks(&owner, s.id).await.unwrap();
        let positions: Vec<(u32, u32)> = all.iter().map(|c| c.position()).collect();
        assert_eq!(positions, vec![(1, 0), (2, 0), (2, 1)]);

        let only_two = store.chunks_for_episodes(&owner, s.id, &[2]).await.unwrap();
        assert_eq!(only_two.len(), 2);
    }
}
