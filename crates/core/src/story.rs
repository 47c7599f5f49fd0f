//! Story aggregate: the root record of one episodic narrative.
//!
//! A story owns its premise-derived metadata, the phase-segmented outline,
//! running aggregates (key events, timeline, settings), the generation
//! pointer, and any batch parked for human validation. Committed episodes
//! live in the store and are immutable; every repair happens on
//! `pending_batch` before commit.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::episode::Episode;

/// Newtype over the story's UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(pub Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque tenant key. Every store call is scoped by it; a mismatch is
/// indistinguishable from absence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Output language for generated prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Hinglish,
}

/// How a batch gets from generated to committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementMode {
    /// Model-judged validation with bounded targeted regeneration.
    #[default]
    Automatic,
    /// Batch parked until an explicit validate call; edits come from
    /// human feedback.
    Human,
}

/// The six-stage narrative arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Exposition,
    IncitingIncident,
    RisingAction,
    Dilemma,
    Climax,
    Denouement,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Exposition,
        Phase::IncitingIncident,
        Phase::RisingAction,
        Phase::Dilemma,
        Phase::Climax,
        Phase::Denouement,
    ];

    /// Lowercase human-readable name, used in prompts and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Exposition => "exposition",
            Phase::IncitingIncident => "inciting incident",
            Phase::RisingAction => "rising action",
            Phase::Dilemma => "dilemma",
            Phase::Climax => "climax",
            Phase::Denouement => "denouement",
        }
    }

    /// Parse a loosely-formatted phase name from model output.
    pub fn parse_loose(s: &str) -> Option<Phase> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "exposition" => Some(Phase::Exposition),
            "incitingincident" => Some(Phase::IncitingIncident),
            "risingaction" => Some(Phase::RisingAction),
            "dilemma" => Some(Phase::Dilemma),
            "climax" => Some(Phase::Climax),
            "denouement" | "resolution" => Some(Phase::Denouement),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One contiguous run of episodes sharing a narrative phase.
///
/// Segments in an outline are ordered, non-overlapping, and their union is
/// exactly `[1, num_episodes]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSegment {
    pub start: u32,
    pub end: u32,
    pub phase: Phase,
    #[serde(default)]
    pub description: String,
}

impl PhaseSegment {
    pub fn contains(&self, episode: u32) -> bool {
        episode >= self.start && episode <= self.end
    }
}

/// A principal character declared at planning time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protagonist {
    pub name: String,
    #[serde(default)]
    pub motivation: String,
    #[serde(default)]
    pub fear: String,
}

/// An entry in the story's running event timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub event: String,
    pub episode: u32,
    /// Set when the event's tier marks it as settled narrative fact
    /// rather than an open thread.
    #[serde(default)]
    pub resolved: bool,
}

/// The story aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub title: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub summary: Option<String>,
    /// Place name → description, merged from episode settings updates.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub protagonists: Vec<Protagonist>,
    #[serde(default)]
    pub special_instructions: String,
    #[serde(default)]
    pub theme: String,
    pub num_episodes: u32,
    /// 1-indexed number of the next episode to generate.
    pub current_episode: u32,
    pub outline: Vec<PhaseSegment>,
    #[serde(default)]
    pub key_events: BTreeSet<String>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    /// Episodes generated but not yet committed (human validation).
    #[serde(default)]
    pub pending_batch: Vec<Episode>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub refinement: RefinementMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    /// Episodes still to generate, counting any parked batch as done.
    pub fn remaining_episodes(&self) -> u32 {
        let highest_pending = self
            .pending_batch
            .iter()
            .map(|e| e.number)
            .max()
            .unwrap_or(self.current_episode.saturating_sub(1));
        self.num_episodes.saturating_sub(highest_pending)
    }

    /// The outline segment covering the given episode.
    pub fn segment_for(&self, episode: u32) -> Option<&PhaseSegment> {
        self.outline.iter().find(|s| s.contains(episode))
    }

    /// The phase of the given episode, defaulting to the terminal phase
    /// when the outline is somehow short.
    pub fn phase_for(&self, episode: u32) -> Phase {
        self.segment_for(episode)
            .map(|s| s.phase)
            .unwrap_or(Phase::Denouement)
    }

    /// Whether the given episode is the last of its outline segment.
    pub fn closes_segment(&self, episode: u32) -> bool {
        self.segment_for(episode).is_some_and(|s| s.end == episode)
    }

    /// Phase of the segment after the one covering `episode`, if any.
    pub fn next_phase_after(&self, episode: u32) -> Option<Phase> {
        let idx = self.outline.iter().position(|s| s.contains(episode))?;
        self.outline.get(idx + 1).map(|s| s.phase)
    }
}
