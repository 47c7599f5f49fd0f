//! SQLite story store.
//!
//! One database file, four tables: `stories`, `episodes`, `characters`,
//! `chunks`. Story, episode, and character records are stored as JSON
//! documents; chunk embeddings as little-endian f32 blobs. Every table is
//! keyed by owner first, so owner scoping is part of the primary key and
//! an owner mismatch reads exactly like absence.

use async_trait::async_trait;
use fableforge_core::error::StoreError;
use fableforge_core::store::{StoreResult, StoryStore};
use fableforge_core::story::{OwnerId, Story, StoryId};
use fableforge_core::{Character, Chunk, Episode};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A durable SQLite `StoryStore`.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables are created automatically. Pass
    /// `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite story store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stories (
                owner       TEXT NOT NULL,
                id          TEXT NOT NULL,
                data        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (owner, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("stories table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                owner     TEXT NOT NULL,
                story_id  TEXT NOT NULL,
                number    INTEGER NOT NULL,
                data      TEXT NOT NULL,
                PRIMARY KEY (owner, story_id, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("episodes table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                owner     TEXT NOT NULL,
                story_id  TEXT NOT NULL,
                name      TEXT NOT NULL,
                data      TEXT NOT NULL,
                PRIMARY KEY (owner, story_id, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("characters table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                owner       TEXT NOT NULL,
                story_id    TEXT NOT NULL,
                episode     INTEGER NOT NULL,
                ordinal     INTEGER NOT NULL,
                content     TEXT NOT NULL,
                embedding   BLOB NOT NULL,
                importance  REAL NOT NULL,
                characters  TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (owner, story_id, episode, ordinal)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chunks table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_stories_created_at ON stories(owner, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn not_found(id: StoryId) -> StoreError {
        StoreError::NotFound(format!("story {id}"))
    }

    fn decode_story(data: &str) -> Result<Story, StoreError> {
        serde_json::from_str(data).map_err(|e| StoreError::Corrupt(format!("story record: {e}")))
    }

    fn decode_episode(data: &str) -> Result<Episode, StoreError> {
        serde_json::from_str(data).map_err(|e| StoreError::Corrupt(format!("episode record: {e}")))
    }

    fn decode_character(data: &str) -> Result<Character, StoreError> {
        serde_json::from_str(data)
            .map_err(|e| StoreError::Corrupt(format!("character record: {e}")))
    }

    /// Serialize an embedding vector to little-endian bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk, StoreError> {
        let story_id: String = row
            .try_get("story_id")
            .map_err(|e| StoreError::Storage(format!("story_id column: {e}")))?;
        let story_id = Uuid::parse_str(&story_id)
            .map(StoryId)
            .map_err(|e| StoreError::Corrupt(format!("story_id: {e}")))?;
        let episode: i64 = row
            .try_get("episode")
            .map_err(|e| StoreError::Storage(format!("episode column: {e}")))?;
        let ordinal: i64 = row
            .try_get("ordinal")
            .map_err(|e| StoreError::Storage(format!("ordinal column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::Storage(format!("content column: {e}")))?;
        let blob: Vec<u8> = row
            .try_get("embedding")
            .map_err(|e| StoreError::Storage(format!("embedding column: {e}")))?;
        let importance: f64 = row
            .try_get("importance")
            .map_err(|e| StoreError::Storage(format!("importance column: {e}")))?;
        let characters_json: String = row
            .try_get("characters")
            .map_err(|e| StoreError::Storage(format!("characters column: {e}")))?;
        let characters: Vec<String> = serde_json::from_str(&characters_json).unwrap_or_default();

        Ok(Chunk {
            story_id,
            episode_number: episode as u32,
            ordinal: ordinal as u32,
            content,
            embedding: Self::blob_to_embedding(&blob),
            importance: importance as f32,
            characters,
        })
    }

    /// Ensure the story exists for this owner before writing children.
    async fn assert_story(&self, owner: &OwnerId, id: StoryId) -> Result<(), StoreError> {
        let row = sqlx::query("SELECT 1 FROM stories WHERE owner = ?1 AND id = ?2")
            .bind(&owner.0)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("story lookup: {e}")))?;
        if row.is_none() {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl StoryStore for SqliteStore {
    async fn create_story(&self, owner: &OwnerId, story: &Story) -> StoreResult<()> {
        let data = serde_json::to_string(story)
            .map_err(|e| StoreError::Storage(format!("story serialization: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO stories (owner, id, data, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner, id) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(&owner.0)
        .bind(story.id.to_string())
        .bind(&data)
        .bind(story.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT story: {e}")))?;
        debug!(story = %story.id, "Stored story");
        Ok(())
    }

    async fn get_story(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Story> {
        let row = sqlx::query("SELECT data FROM stories WHERE owner = ?1 AND id = ?2")
            .bind(&owner.0)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("SELECT story: {e}")))?
            .ok_or_else(|| Self::not_found(id))?;
        let data: String = row
            .try_get("data")
            .map_err(|e| StoreError::Storage(format!("data column: {e}")))?;
        Self::decode_story(&data)
    }

    async fn list_stories(&self, owner: &OwnerId) -> StoreResult<Vec<Story>> {
        let rows =
            sqlx::query("SELECT data FROM stories WHERE owner = ?1 ORDER BY created_at DESC")
                .bind(&owner.0)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("SELECT stories: {e}")))?;
        rows.iter()
            .map(|row| {
                let data: String = row
                    .try_get("data")
                    .map_err(|e| StoreError::Storage(format!("data column: {e}")))?;
                Self::decode_story(&data)
            })
            .collect()
    }

    async fn update_story(&self, owner: &OwnerId, story: &Story) -> StoreResult<()> {
        let data = serde_json::to_string(story)
            .map_err(|e| StoreError::Storage(format!("story serialization: {e}")))?;
        let result = sqlx::query("UPDATE stories SET data = ?3 WHERE owner = ?1 AND id = ?2")
            .bind(&owner.0)
            .bind(story.id.to_string())
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE story: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(Self::not_found(story.id));
        }
        Ok(())
    }

    async fn delete_story(&self, owner: &OwnerId, id: StoryId) -> StoreResult<()> {
        self.assert_story(owner, id).await?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin delete: {e}")))?;
        for table in ["chunks", "characters", "episodes"] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE owner = ?1 AND story_id = ?2"
            ))
            .bind(&owner.0)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE {table}: {e}")))?;
        }
        sqlx::query("DELETE FROM stories WHERE owner = ?1 AND id = ?2")
            .bind(&owner.0)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE story: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit delete: {e}")))?;
        debug!(story = %id, "Deleted story");
        Ok(())
    }

    async fn put_episodes(
        &self,
        owner: &OwnerId,
        id: StoryId,
        episodes: &[Episode],
    ) -> StoreResult<()> {
        self.assert_story(owner, id).await?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin put_episodes: {e}")))?;
        for episode in episodes {
            let data = serde_json::to_string(episode)
                .map_err(|e| StoreError::Storage(format!("episode serialization: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO episodes (owner, story_id, number, data)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(owner, story_id, number) DO UPDATE SET data = excluded.data
                "#,
            )
            .bind(&owner.0)
            .bind(id.to_string())
            .bind(episode.number as i64)
            .bind(&data)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT episode: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit put_episodes: {e}")))?;
        Ok(())
    }

    async fn episodes_in_range(
        &self,
        owner: &OwnerId,
        id: StoryId,
        from: u32,
        to: u32,
    ) -> StoreResult<Vec<Episode>> {
        self.assert_story(owner, id).await?;
        let rows = sqlx::query(
            r#"
            SELECT data FROM episodes
            WHERE owner = ?1 AND story_id = ?2 AND number BETWEEN ?3 AND ?4
            ORDER BY number ASC
            "#,
        )
        .bind(&owner.0)
        .bind(id.to_string())
        .bind(from as i64)
        .bind(to as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SELECT episodes: {e}")))?;
        rows.iter()
            .map(|row| {
                let data: String = row
                    .try_get("data")
                    .map_err(|e| StoreError::Storage(format!("data column: {e}")))?;
                Self::decode_episode(&data)
            })
            .collect()
    }

    async fn upsert_character(
        &self,
        owner: &OwnerId,
        id: StoryId,
        character: &Character,
    ) -> StoreResult<()> {
        self.assert_story(owner, id).await?;
        let data = serde_json::to_string(character)
            .map_err(|e| StoreError::Storage(format!("character serialization: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO characters (owner, story_id, name, data)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner, story_id, name) DO UPDATE SET data = excluded.data
            "#,
        )
        .bind(&owner.0)
        .bind(id.to_string())
        .bind(&character.name)
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT character: {e}")))?;
        Ok(())
    }

    async fn characters(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Vec<Character>> {
        self.assert_story(owner, id).await?;
        let rows = sqlx::query(
            "SELECT data FROM characters WHERE owner = ?1 AND story_id = ?2 ORDER BY name ASC",
        )
        .bind(&owner.0)
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SELECT characters: {e}")))?;
        rows.iter()
            .map(|row| {
                let data: String = row
                    .try_get("data")
                    .map_err(|e| StoreError::Storage(format!("data column: {e}")))?;
                Self::decode_character(&data)
            })
            .collect()
    }

    async fn put_chunks(&self, owner: &OwnerId, id: StoryId, chunks: &[Chunk]) -> StoreResult<()> {
        self.assert_story(owner, id).await?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin put_chunks: {e}")))?;
        for chunk in chunks {
            let characters_json = serde_json::to_string(&chunk.characters)
                .map_err(|e| StoreError::Storage(format!("characters serialization: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO chunks (owner, story_id, episode, ordinal, content, embedding, importance, characters)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(owner, story_id, episode, ordinal) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    importance = excluded.importance,
                    characters = excluded.characters
                "#,
            )
            .bind(&owner.0)
            .bind(id.to_string())
            .bind(chunk.episode_number as i64)
            .bind(chunk.ordinal as i64)
            .bind(&chunk.content)
            .bind(Self::embedding_to_blob(&chunk.embedding))
            .bind(chunk.importance as f64)
            .bind(&characters_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT chunk: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit put_chunks: {e}")))?;
        Ok(())
    }

    async fn chunks_for_episodes(
        &self,
        owner: &OwnerId,
        id: StoryId,
        episodes: &[u32],
    ) -> StoreResult<Vec<Chunk>> {
        self.assert_story(owner, id).await?;
        if episodes.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> =
            (0..episodes.len()).map(|i| format!("?{}", i + 3)).collect();
        let sql = format!(
            "SELECT * FROM chunks WHERE owner = ?1 AND story_id = ?2 AND episode IN ({}) \
             ORDER BY episode ASC, ordinal ASC",
            placeholders.join(", ")
        );
        let mut query = sqlx::query(&sql).bind(&owner.0).bind(id.to_string());
        for episode in episodes {
            query = query.bind(*episode as i64);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("SELECT chunks: {e}")))?;
        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn all_chunks(&self, owner: &OwnerId, id: StoryId) -> StoreResult<Vec<Chunk>> {
        self.assert_story(owner, id).await?;
        let rows = sqlx::query(
            "SELECT * FROM chunks WHERE owner = ?1 AND story_id = ?2 \
             ORDER BY episode ASC, ordinal ASC",
        )
        .bind(&owner.0)
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("SELECT chunks: {e}")))?;
        rows.iter().map(Self::row_to_chunk).collect()
    }
}
