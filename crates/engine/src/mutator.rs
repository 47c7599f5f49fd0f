//! Commit-time state folding.
//!
//! When a batch commits, per-episode snapshots fold into durable character
//! records and the story's running aggregates advance: key events, the
//! timeline, settings, the generation pointer, and completion. This is the
//! only place story state moves forward.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fableforge_core::{Character, Episode, Story, TimelineEntry};
use tracing::debug;

/// A character absent for this many consecutive episodes is marked
/// inactive until featured again.
const ABSENCE_WINDOW: u32 = 3;

/// Fold a committed batch into the story and its character roster.
///
/// Returns every character record that must be upserted. The story's
/// pending batch is cleared; `batch` must already be sorted by number.
pub fn apply_commit(
    story: &mut Story,
    existing: &[Character],
    batch: &[Episode],
    now: DateTime<Utc>,
) -> Vec<Character> {
    let mut roster: BTreeMap<String, Character> = existing
        .iter()
        .map(|c| (c.name.clone(), c.clone()))
        .collect();

    for episode in batch {
        for snapshot in &episode.characters_featured {
            let character = roster
                .entry(snapshot.name.clone())
                .or_insert_with(|| Character::new(snapshot.name.clone()));

            if !snapshot.role.trim().is_empty() {
                character.role = snapshot.role.clone();
            }
            if !snapshot.description.trim().is_empty() {
                character.description = snapshot.description.clone();
            }
            // Per-key merge: a new value wins, untouched keys survive.
            for (name, relation) in &snapshot.relationships {
                character.relationships.insert(name.clone(), relation.clone());
            }
            let next_state = snapshot.emotional_state.trim();
            if !next_state.is_empty() {
                // A change of state is itself a milestone.
                if next_state != character.emotional_state.trim() {
                    character.push_milestone(format!("shift to {next_state}"), episode.number);
                }
                character.emotional_state = next_state.to_string();
            }
            if let Some(milestone) = &snapshot.milestone {
                character.push_milestone(milestone.clone(), episode.number);
            }
            character.last_episode = episode.number;
            character.active = true;
        }

        for key_event in &episode.key_events {
            if key_event.tier.is_durable() {
                story.key_events.insert(key_event.event.clone());
            }
            story.timeline.push(TimelineEntry {
                event: key_event.event.clone(),
                episode: episode.number,
                resolved: key_event.tier.is_durable(),
            });
        }

        for (place, description) in &episode.settings_updates {
            story.settings.insert(place.clone(), description.clone());
        }
    }

    let highest = batch.iter().map(|e| e.number).max().unwrap_or(story.current_episode);
    for character in roster.values_mut() {
        // Planner-seeded characters start at episode 0 and stay active
        // until the window passes them by.
        character.active = highest.saturating_sub(character.last_episode) < ABSENCE_WINDOW;
    }

    story.current_episode = highest + 1;
    story.is_completed = story.current_episode > story.num_episodes;
    story.pending_batch.clear();
    story.updated_at = now;

    debug!(
        story = %story.id,
        current_episode = story.current_episode,
        completed = story.is_completed,
        characters = roster.len(),
        "Committed batch into story state"
    );
    roster.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use fableforge_core::story::{Phase, PhaseSegment, StoryId};
    use fableforge_core::{CharacterSnapshot, EventTier, KeyEvent, Language, RefinementMode};

    fn story(num_episodes: u32) -> Story {
        let now = Utc::now();
        Story {
            id: StoryId::new(),
            title: "T".into(),
            genre: String::new(),
            summary: None,
            settings: BTreeMap::new(),
            protagonists: vec![],
            special_instructions: String::new(),
            theme: String::new(),
            num_episodes,
            current_episode: 1,
            outline: vec![PhaseSegment {
                start: 1,
                end: num_episodes,
                phase: Phase::Exposition,
                description: String::new(),
            }],
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

    fn snapshot(name: &str) -> CharacterSnapshot {
        CharacterSnapshot {
            name: name.into(),
            role: String::new(),
            description: String::new(),
            relationships: BTreeMap::new(),
            emotional_state: String::new(),
            milestone: None,
        }
    }

    #[test]
    fn durable_events_enter_key_events_and_resolve_on_the_timeline() {
        let mut s = story(6);
        let mut ep = Episode::placeholder(1);
        ep.key_events = vec![
            KeyEvent { event: "The harbor burned".into(), tier: EventTier::Foundational },
            KeyEvent { event: "A gull stole bread".into(), tier: EventTier::Contextual },
        ];
        apply_commit(&mut s, &[], &[ep], Utc::now());

        assert!(s.key_events.contains("The harbor burned"));
        assert!(!s.key_events.contains("A gull stole bread"));
        assert_eq!(s.timeline.len(), 2);
        assert!(s.timeline[0].resolved);
        assert!(!s.timeline[1].resolved);
    }

    #[test]
    fn relationships_merge_key_by_key() {
        let mut s = story(6);
        let mut mira = Character::new("Mira");
        mira.relationships.insert("Dev".into(), "estranged brother".into());
        mira.relationships.insert("Ila".into(), "mentor".into());

        let mut ep = Episode::placeholder(1);
        let mut snap = snapshot("Mira");
        snap.relationships.insert("Dev".into(), "reconciled brother".into());
        ep.characters_featured = vec![snap];

        let updated = apply_commit(&mut s, &[mira], &[ep], Utc::now());
        let mira = updated.iter().find(|c| c.name == "Mira").unwrap();
        assert_eq!(mira.relationships["Dev"], "reconciled brother");
        assert_eq!(mira.relationships["Ila"], "mentor");
    }

    #[test]
    fn milestones_attach_to_the_episode_and_cap() {
        let mut s = story(10);
        let mut episodes = Vec::new();
        for n in 1..=7 {
            let mut ep = Episode::placeholder(n);
            let mut snap = snapshot("Mira");
            snap.milestone = Some(format!("change {n}"));
            ep.characters_featured = vec![snap];
            episodes.push(ep);
        }
        let updated = apply_commit(&mut s, &[], &episodes, Utc::now());
        let mira = updated.iter().find(|c| c.name == "Mira").unwrap();
        assert_eq!(mira.milestones.len(), 5);
        assert_eq!(mira.milestones[0].episode, 3);
        assert_eq!(mira.milestones[4].episode, 7);
    }

    #[test]
    fn emotional_shift_appends_a_milestone() {
        let mut s = story(6);
        let mut mira = Character::new("Mira");
        mira.emotional_state = "calm".into();

        let mut ep = Episode::placeholder(4);
        let mut snap = snapshot("Mira");
        snap.emotional_state = "angry".into();
        ep.characters_featured = vec![snap];

        let updated = apply_commit(&mut s, &[mira], &[ep], Utc::now());
        let mira = updated.iter().find(|c| c.name == "Mira").unwrap();
        assert_eq!(mira.emotional_state, "angry");
        assert_eq!(mira.milestones.len(), 1);
        assert_eq!(mira.milestones[0].event, "shift to angry");
        assert_eq!(mira.milestones[0].episode, 4);
    }

    #[test]
    fn unchanged_emotional_state_records_no_milestone() {
        let mut s = story(6);
        let mut mira = Character::new("Mira");
        mira.emotional_state = "calm".into();

        let mut ep = Episode::placeholder(2);
        let mut snap = snapshot("Mira");
        snap.emotional_state = "calm".into();
        snap.milestone = Some("found the key".into());
        ep.characters_featured = vec![snap];

        let updated = apply_commit(&mut s, &[mira], &[ep], Utc::now());
        let mira = updated.iter().find(|c| c.name == "Mira").unwrap();
        // Only the model-supplied milestone; no shift entry.
        assert_eq!(mira.milestones.len(), 1);
        assert_eq!(mira.milestones[0].event, "found the key");
    }

    #[test]
    fn pointer_completion_and_pending_batch() {
        let mut s = story(4);
        s.pending_batch = vec![Episode::placeholder(3), Episode::placeholder(4)];
        s.current_episode = 3;
        apply_commit(
            &mut s,
            &[],
            &[Episode::placeholder(3), Episode::placeholder(4)],
            Utc::now(),
        );
        assert_eq!(s.current_episode, 5);
        assert!(s.is_completed);
        assert!(s.pending_batch.is_empty());
    }

    #[test]
    fn long_absence_deactivates_until_featured_again() {
        let mut s = story(10);
        let mut old = Character::new("Old Ben");
        old.last_episode = 1;
        let mut ep = Episode::placeholder(5);
        ep.characters_featured = vec![snapshot("Mira")];

        let updated = apply_commit(&mut s, &[old], &[ep], Utc::now());
        let ben = updated.iter().find(|c| c.name == "Old Ben").unwrap();
        let mira = updated.iter().find(|c| c.name == "Mira").unwrap();
        assert!(!ben.active);
        assert!(mira.active);
    }

    #[test]
    fn settings_updates_merge_into_story_settings() {
        let mut s = story(6);
        s.settings.insert("Karem Port".into(), "a smuggler's harbor".into());
        let mut ep = Episode::placeholder(1);
        ep.settings_updates.insert("Karem Port".into(), "a harbor under curfew".into());
        ep.settings_updates.insert("Open Sea".into(), "grey and endless".into());
        apply_commit(&mut s, &[], &[ep], Utc::now());
        assert_eq!(s.settings["Karem Port"], "a harbor under curfew");
        assert_eq!(s.settings.len(), 2);
    }
}
