//! Durable character records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Most recent milestones kept per character.
pub const MILESTONE_CAP: usize = 5;

/// A character milestone tied to the episode it happened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub event: String,
    pub episode: u32,
}

/// The durable, story-scoped record of one character, folded together from
/// per-episode snapshots at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    /// Other-character name → relationship description. Merged key by key;
    /// a new snapshot wins per key, untouched keys survive.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,
    #[serde(default)]
    pub emotional_state: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    /// Last episode this character was featured in.
    #[serde(default)]
    pub last_episode: u32,
}

fn default_active() -> bool {
    true
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: String::new(),
            description: String::new(),
            relationships: BTreeMap::new(),
            emotional_state: "neutral".into(),
            active: true,
            milestones: Vec::new(),
            last_episode: 0,
        }
    }

    /// Record a milestone, keeping only the most recent `MILESTONE_CAP`.
    pub fn push_milestone(&mut self, event: impl Into<String>, episode: u32) {
        self.milestones.push(Milestone { event: event.into(), episode });
        if self.milestones.len() > MILESTONE_CAP {
            let excess = self.milestones.len() - MILESTONE_CAP;
            self.milestones.drain(..excess);
        }
    }
}
