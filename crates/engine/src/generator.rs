//! Two-stage episode generation.
//!
//! Stage 1 writes the prose (title + content); stage 2 re-reads that prose
//! and extracts structured metadata. Splitting the call keeps the narration
//! prompt free of bookkeeping and lets metadata extraction fail softly
//! without touching the prose. Both stages run model output through the
//! layered extractor.

use std::collections::BTreeMap;
use std::sync::Arc;

use fableforge_core::error::Result;
use fableforge_core::provider::{GenerationRequest, LanguageModel};
use fableforge_core::{extract_object, CharacterSnapshot, Episode, EventTier, KeyEvent};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::context::EpisodeContext;
use crate::prompts;

/// Character budget for a summary synthesized from prose when stage 2
/// yields none.
const SUMMARY_FALLBACK_CHARS: usize = 240;

/// Runs both generation stages against one language model.
pub struct EpisodeGenerator {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    max_tokens: u32,
}

impl EpisodeGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, temperature: 0.7, max_tokens: 8192 }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Generate one episode from its assembled context.
    pub async fn generate(&self, ctx: &EpisodeContext) -> Result<Episode> {
        let draft = self.draft(prompts::stage_one(ctx), ctx.number).await?;
        debug!(episode = ctx.number, title = %draft.title, "Drafted episode");
        self.annotate(ctx, draft).await
    }

    /// Rewrite a flagged episode against feedback, then re-annotate it.
    pub async fn regenerate(
        &self,
        ctx: &EpisodeContext,
        episode: &Episode,
        feedback: &str,
        previous_summary: Option<&str>,
        closes_batch: bool,
    ) -> Result<Episode> {
        let prompt = prompts::regenerate(
            &ctx.story_title,
            episode,
            feedback,
            previous_summary,
            ctx.is_final,
            closes_batch,
        );
        let draft = self.draft(prompt, episode.number).await?;
        debug!(episode = episode.number, "Regenerated episode");
        self.annotate(ctx, draft).await
    }

    /// Stage 1: one call producing title and prose.
    async fn draft(&self, prompt: String, number: u32) -> Result<Draft> {
        let completion = self
            .model
            .generate(
                GenerationRequest::new(prompt)
                    .with_temperature(self.temperature)
                    .with_max_tokens(self.max_tokens),
            )
            .await?;

        let extracted = extract_object::<RawDraft>(
            &completion.text,
            &["title", "content"],
            json!({ "title": format!("Episode {number}"), "content": "" }),
        )?;
        if extracted.route.is_degraded() {
            warn!(episode = number, route = ?extracted.route, "Draft recovered through a degraded parse");
        }

        let raw = extracted.value;
        // A response that never was JSON is still prose worth keeping.
        let content = if raw.content.trim().is_empty() {
            completion.text.trim().to_string()
        } else {
            raw.content
        };
        let title = if raw.title.trim().is_empty() {
            format!("Episode {number}")
        } else {
            raw.title
        };
        Ok(Draft { number, title, content })
    }

    /// Stage 2: one call extracting metadata for the drafted prose.
    async fn annotate(&self, ctx: &EpisodeContext, draft: Draft) -> Result<Episode> {
        let prompt = prompts::stage_two(ctx, &draft.title, &draft.content);
        let completion = self
            .model
            .generate(
                GenerationRequest::new(prompt)
                    .with_temperature(self.temperature)
                    .with_max_tokens(self.max_tokens),
            )
            .await?;

        let extracted = extract_object::<RawAnnotations>(
            &completion.text,
            &["summary", "emotional_state"],
            json!({
                "summary": "",
                "emotional_state": "neutral",
                "characters_featured": [],
                "key_events": [],
                "settings_updates": {},
            }),
        )?;
        if extracted.route.is_degraded() {
            warn!(episode = draft.number, route = ?extracted.route, "Annotations recovered through a degraded parse");
        }
        let raw = extracted.value;

        let summary = if raw.summary.trim().is_empty() {
            truncate_chars(&draft.content, SUMMARY_FALLBACK_CHARS)
        } else {
            raw.summary
        };

        let key_events = raw
            .key_events
            .into_iter()
            .filter(|e| !e.event.trim().is_empty())
            .map(|e| KeyEvent {
                event: e.event,
                tier: EventTier::parse_loose(&e.tier).unwrap_or(EventTier::Contextual),
            })
            .collect();

        let characters_featured = raw
            .characters_featured
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .map(|c| CharacterSnapshot {
                name: c.name.trim().to_string(),
                role: c.role,
                description: c.description,
                relationships: c.relationships,
                emotional_state: c.emotional_state,
                milestone: c.milestone.filter(|m| !m.trim().is_empty()),
            })
            .collect();

        Ok(Episode {
            number: draft.number,
            title: draft.title,
            content: draft.content,
            summary,
            emotional_state: if raw.emotional_state.is_empty() {
                "neutral".into()
            } else {
                raw.emotional_state
            },
            key_events,
            settings_updates: raw.settings_updates,
            characters_featured,
        })
    }
}

struct Draft {
    number: u32,
    title: String,
    content: String,
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

// --- Raw model-output shapes ---

#[derive(Debug, Deserialize)]
struct RawDraft {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawAnnotations {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    emotional_state: String,
    #[serde(default)]
    characters_featured: Vec<RawSnapshot>,
    #[serde(default)]
    key_events: Vec<RawKeyEvent>,
    #[serde(default)]
    settings_updates: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    relationships: BTreeMap<String, String>,
    #[serde(default)]
    emotional_state: String,
    #[serde(default)]
    milestone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeyEvent {
    #[serde(default)]
    event: String,
    #[serde(default)]
    tier: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextAssembler;

    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;
    use fableforge_core::story::{Phase, PhaseSegment, StoryId};
    use fableforge_core::{Language, RefinementMode, Story};
    use fableforge_providers::ScriptedProvider;

    fn story() -> Story {
        let now = Utc::now();
        Story {
            id: StoryId::new(),
            title: "The Salt Road".into(),
            genre: "adventure".into(),
            summary: None,
            settings: BTreeMap::new(),
            protagonists: vec![],
            special_instructions: String::new(),
            theme: String::new(),
            num_episodes: 4,
            current_episode: 1,
            outline: vec![PhaseSegment {
                start: 1,
                end: 4,
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

    fn ctx(number: u32) -> crate::context::EpisodeContext {
        ContextAssembler::new().assemble(&story(), number, &[], &[], &[], &[])
    }

    #[tokio::test]
    async fn two_stage_generation_fills_prose_and_metadata() {
        let provider = Arc::new(ScriptedProvider::from_strs(&[
            r#"{ "title": "Cast Off", "content": "The ropes came free at dawn." }"#,
            r#"{ "summary": "They leave the harbor.", "emotional_state": "hopeful",
                 "characters_featured": [{ "name": "Mira", "role": "protagonist",
                   "description": "", "emotional_state": "hopeful",
                   "relationships": {}, "milestone": null }],
                 "key_events": [{ "event": "Mira leaves Karem Port", "tier": "foundational" }],
                 "settings_updates": { "Open Sea": "grey and endless" } }"#,
        ]));
        let generator = EpisodeGenerator::new(provider.clone());
        let episode = generator.generate(&ctx(1)).await.unwrap();

        assert_eq!(episode.title, "Cast Off");
        assert_eq!(episode.summary, "They leave the harbor.");
        assert_eq!(episode.key_events[0].tier, EventTier::Foundational);
        assert_eq!(episode.characters_featured[0].name, "Mira");
        assert_eq!(episode.settings_updates["Open Sea"], "grey and endless");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn prose_response_without_json_becomes_the_content() {
        let provider = Arc::new(ScriptedProvider::from_strs(&[
            "The ropes came free at dawn and nobody looked back.",
            "not json either",
        ]));
        let generator = EpisodeGenerator::new(provider);
        let episode = generator.generate(&ctx(2)).await.unwrap();

        assert_eq!(episode.title, "Episode 2");
        assert!(episode.content.contains("ropes came free"));
        // Summary falls back to a prose prefix.
        assert!(!episode.summary.is_empty());
        assert_eq!(episode.emotional_state, "neutral");
    }

    #[tokio::test]
    async fn unknown_tier_downgrades_to_contextual() {
        let provider = Arc::new(ScriptedProvider::from_strs(&[
            r#"{ "title": "T", "content": "C." }"#,
            r#"{ "summary": "S.", "emotional_state": "calm",
                 "key_events": [{ "event": "something odd", "tier": "pivotal" }] }"#,
        ]));
        let generator = EpisodeGenerator::new(provider);
        let episode = generator.generate(&ctx(1)).await.unwrap();
        assert_eq!(episode.key_events[0].tier, EventTier::Contextual);
    }

    #[test]
    fn char_truncation_respects_boundaries() {
        let s = truncate_chars("héllo wörld", 5);
        assert_eq!(s, "héllo...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
