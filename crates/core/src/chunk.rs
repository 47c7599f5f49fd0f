//! Chunk value objects for the episodic memory store.

use serde::{Deserialize, Serialize};

use crate::story::StoryId;

/// One semantically-coherent slice of an episode, embedded for retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub story_id: StoryId,
    pub episode_number: u32,
    /// Position of this chunk within its episode.
    pub ordinal: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Character-mention count plus anchor bonus; never recomputed after
    /// ingestion.
    pub importance: f32,
    /// Names of tagged characters mentioned in this chunk.
    #[serde(default)]
    pub characters: Vec<String>,
}

impl Chunk {
    /// Stable ordering key for deterministic tie-breaks.
    pub fn position(&self) -> (u32, u32) {
        (self.episode_number, self.ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_orders_by_episode_then_ordinal() {
        let a = Chunk {
            story_id: StoryId::new(),
            episode_number: 2,
            ordinal: 0,
            content: String::new(),
            embedding: vec![],
            importance: 0.0,
            characters: vec![],
        };
        let mut b = a.clone();
        b.episode_number = 1;
        b.ordinal = 9;
        assert!(b.position() < a.position());
    }
}
