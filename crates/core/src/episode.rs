//! Episode value objects.
//!
//! An episode is mutable while it sits in a pending batch and frozen once
//! committed. Stage 1 of generation fills title and content; stage 2 fills
//! the structured metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Narrative weight of a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTier {
    /// World- or premise-level fact; persists for the whole story.
    Foundational,
    /// Permanently changes who a character is.
    CharacterDefining,
    /// Moves the plot between states.
    Transitional,
    /// Local color; safe to forget.
    Contextual,
}

impl EventTier {
    /// Tiers that enter the story's long-lived aggregates.
    pub fn is_durable(&self) -> bool {
        matches!(self, EventTier::Foundational | EventTier::CharacterDefining)
    }

    pub fn parse_loose(s: &str) -> Option<EventTier> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "foundational" => Some(EventTier::Foundational),
            "characterdefining" => Some(EventTier::CharacterDefining),
            "transitional" => Some(EventTier::Transitional),
            "contextual" => Some(EventTier::Contextual),
            _ => None,
        }
    }
}

/// One tagged event extracted from an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub event: String,
    pub tier: EventTier,
}

/// A character's state as featured in one episode: stage-2 output, later
/// folded into the durable `Character` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    #[serde(default)]
    pub emotional_state: String,
    #[serde(default)]
    pub milestone: Option<String>,
}

/// A generated episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub number: u32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub emotional_state: String,
    #[serde(default)]
    pub key_events: Vec<KeyEvent>,
    #[serde(default)]
    pub settings_updates: BTreeMap<String, String>,
    #[serde(default)]
    pub characters_featured: Vec<CharacterSnapshot>,
}

impl Episode {
    /// A minimal stand-in used when model output is irreparably malformed
    /// and in tests.
    pub fn placeholder(number: u32) -> Self {
        Self {
            number,
            title: format!("Episode {number}"),
            content: String::new(),
            summary: String::new(),
            emotional_state: "neutral".into(),
            key_events: Vec::new(),
            settings_updates: BTreeMap::new(),
            characters_featured: Vec::new(),
        }
    }

    /// Names of characters featured in this episode.
    pub fn featured_names(&self) -> Vec<&str> {
        self.characters_featured.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A human instruction targeting one pending episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub episode_number: u32,
    pub instruction: String,
}

/// Validator output flagging one pending episode for regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeFeedback {
    pub episode_number: u32,
    pub feedback: String,
}
