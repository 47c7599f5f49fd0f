//! Per-episode context assembly.
//!
//! Before each episode is generated, the assembler gathers everything the
//! prompt needs: a recap of recent episodes, full prose of the last couple,
//! the character roster split into present and absent, a filtered slice of
//! the event timeline, retrieved memory chunks, and the phase guidance for
//! the target episode. Assembly is pure: given the same story state and
//! query embedding it produces the same context.

use fableforge_core::story::Phase;
use fableforge_core::{Character, Chunk, Episode, Story, TimelineEntry};
use fableforge_memory::{anchor_episodes, retrieve_relevant};
use fableforge_planner::{phase_requirements, transition_guide};

/// Timeline entries surfaced per episode prompt.
const KEY_EVENT_CAP: usize = 10;

/// A one-line recap of an already-generated episode.
#[derive(Debug, Clone)]
pub struct EpisodeBrief {
    pub number: u32,
    pub title: String,
    pub summary: String,
}

/// Everything the generator needs to write one episode.
#[derive(Debug, Clone)]
pub struct EpisodeContext {
    pub number: u32,
    pub phase: Phase,
    pub segment_description: String,
    pub phase_requirements: &'static str,
    /// Present only on the final episode of an outline segment.
    pub transition: Option<String>,
    pub is_final: bool,
    pub story_title: String,
    pub genre: String,
    pub theme: String,
    pub special_instructions: String,
    pub hinglish: bool,
    pub settings: Vec<(String, String)>,
    pub recap: Vec<EpisodeBrief>,
    /// Full prose of the most recent episodes, ascending.
    pub recent_content: Vec<(u32, String)>,
    pub active_characters: Vec<Character>,
    pub absent_characters: Vec<String>,
    pub key_events: Vec<String>,
    pub retrieved: Vec<Chunk>,
}

/// Builds an [`EpisodeContext`] from story state.
pub struct ContextAssembler {
    recap_window: usize,
    content_window: usize,
    top_k: usize,
    pin_anchors: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { recap_window: 3, content_window: 2, top_k: 5, pin_anchors: true }
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recap_window(mut self, window: usize) -> Self {
        self.recap_window = window;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_pin_anchors(mut self, pin: bool) -> Self {
        self.pin_anchors = pin;
        self
    }

    /// Assemble the context for episode `number`.
    ///
    /// `prior` holds the episodes the target can see, ascending: recently
    /// committed ones plus everything generated earlier in this batch.
    pub fn assemble(
        &self,
        story: &Story,
        number: u32,
        prior: &[Episode],
        characters: &[Character],
        chunks: &[Chunk],
        query_embedding: &[f32],
    ) -> EpisodeContext {
        let phase = story.phase_for(number);
        let segment_description = story
            .segment_for(number)
            .map(|s| s.description.clone())
            .unwrap_or_default();

        let transition = if story.closes_segment(number) {
            story
                .next_phase_after(number)
                .map(|next| transition_guide(phase, next))
        } else {
            None
        };

        let recap = prior
            .iter()
            .rev()
            .take(self.recap_window)
            .map(|e| EpisodeBrief {
                number: e.number,
                title: e.title.clone(),
                summary: e.summary.clone(),
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let recent_content: Vec<(u32, String)> = prior
            .iter()
            .rev()
            .take(self.content_window)
            .map(|e| (e.number, e.content.clone()))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let (active, absent): (Vec<&Character>, Vec<&Character>) =
            characters.iter().partition(|c| c.active);
        let active_characters: Vec<Character> = active.into_iter().cloned().collect();
        let absent_characters = absent.into_iter().map(|c| c.name.clone()).collect();

        let active_names: Vec<&str> =
            active_characters.iter().map(|c| c.name.as_str()).collect();
        let key_events = filter_key_events(&story.timeline, &active_names, phase, KEY_EVENT_CAP);

        let anchors = if self.pin_anchors {
            anchor_episodes(story.num_episodes)
        } else {
            Vec::new()
        };
        let retrieved = retrieve_relevant(chunks, query_embedding, self.top_k, &anchors);

        EpisodeContext {
            number,
            phase,
            segment_description,
            phase_requirements: phase_requirements(phase),
            transition,
            is_final: number == story.num_episodes,
            story_title: story.title.clone(),
            genre: story.genre.clone(),
            theme: story.theme.clone(),
            special_instructions: story.special_instructions.clone(),
            hinglish: story.language == fableforge_core::Language::Hinglish,
            settings: story
                .settings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            recap,
            recent_content,
            active_characters,
            absent_characters,
            key_events,
            retrieved,
        }
    }
}

/// Words that mark an open thread as relevant to the current phase.
fn phase_keywords(phase: Phase) -> &'static [&'static str] {
    match phase {
        Phase::Exposition => &["arrive", "meet", "home", "routine"],
        Phase::IncitingIncident => &["discover", "arrive", "stranger", "warning"],
        Phase::RisingAction => &["pursue", "obstacle", "ally", "secret"],
        Phase::Dilemma => &["choice", "secret", "betray", "promise"],
        Phase::Climax => &["confront", "reveal", "betray", "sacrifice"],
        Phase::Denouement => &["return", "promise", "loss", "reveal"],
    }
}

/// Pick the timeline entries worth repeating in a prompt.
///
/// Resolved entries are settled narrative facts and always qualify; open
/// entries qualify when they name an active character or touch a keyword of
/// the current phase. The most recent `cap` winners are returned in story
/// order.
fn filter_key_events(
    timeline: &[TimelineEntry],
    active_names: &[&str],
    phase: Phase,
    cap: usize,
) -> Vec<String> {
    let keywords = phase_keywords(phase);
    let mut picked: Vec<&TimelineEntry> = timeline
        .iter()
        .filter(|entry| {
            let lower = entry.event.to_lowercase();
            entry.resolved
                || active_names.iter().any(|name| lower.contains(&name.to_lowercase()))
                || keywords.iter().any(|k| lower.contains(k))
        })
        .collect();

    if picked.len() > cap {
        picked.drain(..picked.len() - cap);
    }
    picked
        .into_iter()
        .map(|entry| format!("Ep {}: {}", entry.episode, entry.event))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;
    use fableforge_core::story::{PhaseSegment, StoryId};
    use fableforge_core::{Language, RefinementMode};

    fn story(num_episodes: u32) -> Story {
        let now = Utc::now();
        Story {
            id: StoryId::new(),
            title: "The Lighthouse".into(),
            genre: "mystery".into(),
            summary: None,
            settings: BTreeMap::new(),
            protagonists: vec![],
            special_instructions: String::new(),
            theme: String::new(),
            num_episodes,
            current_episode: 1,
            outline: vec![
                PhaseSegment {
                    start: 1,
                    end: 3,
                    phase: Phase::Exposition,
                    description: "the keeper's routine".into(),
                },
                PhaseSegment {
                    start: 4,
                    end: num_episodes,
                    phase: Phase::Climax,
                    description: String::new(),
                },
            ],
            key_events: BTreeSet::new(),
            timeline: vec![],
            pending_batch: vec![],
            is_completed: false,
            language: Language::English,
            refinement: RefinementMode::Automatic,
            created_at: now,
            updated_at: now,
        }
    }

    fn episode(number: u32) -> Episode {
        let mut e = Episode::placeholder(number);
        e.summary = format!("summary {number}");
        e.content = format!("content {number}");
        e
    }

    #[test]
    fn recap_and_content_windows_take_the_most_recent() {
        let story = story(8);
        let prior: Vec<Episode> = (1..=5).map(episode).collect();
        let ctx = ContextAssembler::new().assemble(&story, 6, &prior, &[], &[], &[]);

        let recap_numbers: Vec<u32> = ctx.recap.iter().map(|b| b.number).collect();
        assert_eq!(recap_numbers, vec![3, 4, 5]);
        let content_numbers: Vec<u32> = ctx.recent_content.iter().map(|(n, _)| *n).collect();
        assert_eq!(content_numbers, vec![4, 5]);
    }

    #[test]
    fn transition_appears_only_on_segment_close() {
        let story = story(8);
        let ctx = ContextAssembler::new().assemble(&story, 2, &[], &[], &[], &[]);
        assert!(ctx.transition.is_none());

        let ctx = ContextAssembler::new().assemble(&story, 3, &[], &[], &[], &[]);
        assert!(ctx.transition.is_some());

        // Final segment has nothing to transition into.
        let ctx = ContextAssembler::new().assemble(&story, 8, &[], &[], &[], &[]);
        assert!(ctx.transition.is_none());
        assert!(ctx.is_final);
    }

    #[test]
    fn characters_split_by_active_flag() {
        let story = story(4);
        let mut mira = Character::new("Mira");
        mira.last_episode = 3;
        let mut ghost = Character::new("Old Ben");
        ghost.active = false;
        let ctx =
            ContextAssembler::new().assemble(&story, 4, &[], &[mira, ghost], &[], &[]);
        assert_eq!(ctx.active_characters.len(), 1);
        assert_eq!(ctx.absent_characters, vec!["Old Ben".to_string()]);
    }

    #[test]
    fn key_events_prefer_resolved_and_active_mentions() {
        let mut story = story(6);
        story.timeline = vec![
            TimelineEntry { event: "The lamp oil ran out".into(), episode: 1, resolved: true },
            TimelineEntry { event: "Mira found a key".into(), episode: 2, resolved: false },
            TimelineEntry { event: "A gull stole bread".into(), episode: 2, resolved: false },
        ];
        let mira = Character::new("Mira");
        let ctx = ContextAssembler::new().assemble(&story, 3, &[], &[mira], &[], &[]);
        assert_eq!(ctx.key_events.len(), 2);
        assert!(ctx.key_events[0].contains("lamp oil"));
        assert!(ctx.key_events[1].contains("Mira"));
    }

    #[test]
    fn key_events_cap_keeps_the_most_recent() {
        let timeline: Vec<TimelineEntry> = (1..=15)
            .map(|i| TimelineEntry {
                event: format!("fact {i}"),
                episode: i,
                resolved: true,
            })
            .collect();
        let picked = filter_key_events(&timeline, &[], Phase::Exposition, 10);
        assert_eq!(picked.len(), 10);
        assert!(picked[0].contains("fact 6"));
        assert!(picked[9].contains("fact 15"));
    }
}
