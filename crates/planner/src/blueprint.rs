//! Premise-to-blueprint planning.
//!
//! One model call turns a premise into story metadata, a character roster,
//! and a phase-segmented outline. The response goes through the layered
//! extractor, and the outline through normalization, so a malformed plan
//! degrades instead of failing story creation.

use std::collections::BTreeMap;
use std::sync::Arc;

use fableforge_core::error::{Error, PlannerError, Result};
use fableforge_core::provider::{GenerationRequest, LanguageModel};
use fableforge_core::story::{Language, Phase, PhaseSegment, Protagonist};
use fableforge_core::{extract_object, Character};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::outline::normalize_outline;

/// Everything planning produces for a new story.
#[derive(Debug, Clone)]
pub struct StoryBlueprint {
    pub title: String,
    pub genre: String,
    pub theme: String,
    pub special_instructions: String,
    pub settings: BTreeMap<String, String>,
    pub protagonists: Vec<Protagonist>,
    pub characters: Vec<Character>,
    pub outline: Vec<PhaseSegment>,
}

/// Plans a story from a premise with one model call.
pub struct OutlinePlanner {
    model: Arc<dyn LanguageModel>,
    temperature: f32,
    max_tokens: u32,
}

impl OutlinePlanner {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model, temperature: 0.7, max_tokens: 4096 }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Plan a story.
    pub async fn plan(
        &self,
        premise: &str,
        num_episodes: u32,
        language: Language,
    ) -> Result<StoryBlueprint> {
        if num_episodes == 0 {
            return Err(Error::Planner(PlannerError::InvalidEpisodeCount(0)));
        }

        let prompt = render_plan_prompt(premise, num_episodes, language);
        let completion = self
            .model
            .generate(
                GenerationRequest::new(prompt)
                    .with_temperature(self.temperature)
                    .with_max_tokens(self.max_tokens),
            )
            .await?;

        let extracted = extract_object::<RawBlueprint>(
            &completion.text,
            &["title", "genre", "theme", "special_instructions"],
            placeholder_blueprint(),
        )?;
        if extracted.route.is_degraded() {
            warn!(route = ?extracted.route, "Blueprint recovered through a degraded parse");
        }

        let blueprint = finish_blueprint(extracted.value, num_episodes);
        info!(
            title = %blueprint.title,
            segments = blueprint.outline.len(),
            characters = blueprint.characters.len(),
            "Planned story"
        );
        Ok(blueprint)
    }
}

fn render_plan_prompt(premise: &str, num_episodes: u32, language: Language) -> String {
    let language_instruction = match language {
        Language::Hinglish => {
            "Write every field in natural Hinglish (Hindi written in Latin script mixed with English)."
        }
        Language::English => "",
    };

    format!(
        r#"You are a story architect. Plan a serialized story of exactly {num_episodes} episodes from the premise below.
{language_instruction}

PREMISE:
{premise}

Divide the episodes into narrative phases in order: exposition, inciting incident, rising action, dilemma, climax, denouement. A short story may skip middle phases but must keep the opening and ending phases. Phase ranges must cover episodes 1 through {num_episodes} exactly once, in order.

Respond with ONLY a JSON object in this exact shape:
{{
  "title": "story title",
  "genre": "primary genre",
  "theme": "central theme in one sentence",
  "special_instructions": "tone and style notes for the narrator",
  "settings": {{ "place name": "one-line description" }},
  "protagonists": [{{ "name": "...", "motivation": "...", "fear": "..." }}],
  "characters": [{{ "name": "...", "role": "protagonist|antagonist|supporting", "description": "...", "emotional_state": "...", "relationships": {{ "other name": "relationship" }} }}],
  "outline": [{{ "start": 1, "end": 2, "phase": "exposition", "description": "what these episodes cover" }}]
}}"#
    )
}

fn placeholder_blueprint() -> serde_json::Value {
    json!({
        "title": "Untitled Story",
        "genre": "General",
        "theme": "",
        "special_instructions": "",
        "settings": {},
        "protagonists": [],
        "characters": [],
        "outline": [],
    })
}

fn finish_blueprint(raw: RawBlueprint, num_episodes: u32) -> StoryBlueprint {
    let proposed: Vec<PhaseSegment> = raw
        .outline
        .into_iter()
        .enumerate()
        .map(|(i, s)| PhaseSegment {
            start: s.start,
            end: s.end,
            phase: Phase::parse_loose(&s.phase)
                .unwrap_or(Phase::ALL[i.min(Phase::ALL.len() - 1)]),
            description: s.description,
        })
        .collect();

    let characters = raw
        .characters
        .into_iter()
        .filter(|c| !c.name.trim().is_empty())
        .map(|c| {
            let mut character = Character::new(c.name.trim());
            character.role = c.role;
            character.description = c.description;
            character.emotional_state = if c.emotional_state.is_empty() {
                "neutral".into()
            } else {
                c.emotional_state
            };
            character.relationships = c.relationships;
            character
        })
        .collect();

    StoryBlueprint {
        title: if raw.title.trim().is_empty() { "Untitled Story".into() } else { raw.title },
        genre: raw.genre,
        theme: raw.theme,
        special_instructions: raw.special_instructions,
        settings: raw.settings,
        protagonists: raw
            .protagonists
            .into_iter()
            .filter(|p| !p.name.trim().is_empty())
            .map(|p| Protagonist { name: p.name, motivation: p.motivation, fear: p.fear })
            .collect(),
        characters,
        outline: normalize_outline(proposed, num_episodes),
    }
}

// --- Raw model-output shapes ---

#[derive(Debug, Deserialize)]
struct RawBlueprint {
    #[serde(default)]
    title: String,
    #[serde(default)]
    genre: String,
    #[serde(default)]
    theme: String,
    #[serde(default)]
    special_instructions: String,
    #[serde(default)]
    settings: BTreeMap<String, String>,
    #[serde(default)]
    protagonists: Vec<RawProtagonist>,
    #[serde(default)]
    characters: Vec<RawCharacter>,
    #[serde(default)]
    outline: Vec<RawSegment>,
}

#[derive(Debug, Deserialize)]
struct RawProtagonist {
    #[serde(default)]
    name: String,
    #[serde(default)]
    motivation: String,
    #[serde(default)]
    fear: String,
}

#[derive(Debug, Deserialize)]
struct RawCharacter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    emotional_state: String,
    #[serde(default)]
    relationships: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default)]
    start: u32,
    #[serde(default)]
    end: u32,
    #[serde(default)]
    phase: String,
    #[serde(default)]
    description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fableforge_providers::ScriptedProvider;

    fn good_blueprint_json() -> String {
        json!({
            "title": "The Salt Road",
            "genre": "adventure",
            "theme": "what loyalty costs",
            "special_instructions": "keep the narration spare",
            "settings": { "Karem Port": "a smuggler's harbor" },
            "protagonists": [{ "name": "Mira", "motivation": "clear her name", "fear": "open water" }],
            "characters": [
                { "name": "Mira", "role": "protagonist", "description": "a disgraced pilot",
                  "emotional_state": "restless", "relationships": { "Dev": "estranged brother" } },
                { "name": "Dev", "role": "supporting", "description": "a harbor clerk",
                  "emotional_state": "wary", "relationships": {} }
            ],
            "outline": [
                { "start": 1, "end": 2, "phase": "exposition", "description": "harbor life" },
                { "start": 3, "end": 5, "phase": "rising action", "description": "the voyage" },
                { "start": 6, "end": 6, "phase": "denouement", "description": "homecoming" }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn plans_from_clean_json() {
        let provider = Arc::new(ScriptedProvider::new(vec![good_blueprint_json()]));
        let planner = OutlinePlanner::new(provider);
        let blueprint = planner.plan("a smuggler's redemption", 6, Language::English).await.unwrap();

        assert_eq!(blueprint.title, "The Salt Road");
        assert_eq!(blueprint.characters.len(), 2);
        assert_eq!(blueprint.outline.len(), 3);
        assert_eq!(blueprint.outline[0].start, 1);
        assert_eq!(blueprint.outline.last().unwrap().end, 6);
        assert_eq!(blueprint.outline[1].phase, Phase::RisingAction);
    }

    #[tokio::test]
    async fn plans_from_fenced_json() {
        let response = format!("Here is your plan:\n```json\n{}\n```", good_blueprint_json());
        let provider = Arc::new(ScriptedProvider::new(vec![response]));
        let planner = OutlinePlanner::new(provider);
        let blueprint = planner.plan("premise", 6, Language::English).await.unwrap();
        assert_eq!(blueprint.title, "The Salt Road");
    }

    #[tokio::test]
    async fn garbage_response_still_yields_full_coverage() {
        let provider = Arc::new(ScriptedProvider::always("I cannot help with that."));
        let planner = OutlinePlanner::new(provider);
        let blueprint = planner.plan("premise", 10, Language::English).await.unwrap();

        assert_eq!(blueprint.title, "Untitled Story");
        assert_eq!(blueprint.outline[0].start, 1);
        assert_eq!(blueprint.outline.last().unwrap().end, 10);
        for pair in blueprint.outline.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 1);
        }
    }

    #[tokio::test]
    async fn misshapen_outline_is_repaired() {
        let mut value: serde_json::Value = serde_json::from_str(&good_blueprint_json()).unwrap();
        value["outline"] = json!([
            { "start": 2, "end": 1, "phase": "exposition", "description": "" },
            { "start": 9, "end": 30, "phase": "climax", "description": "" }
        ]);
        let provider = Arc::new(ScriptedProvider::new(vec![value.to_string()]));
        let planner = OutlinePlanner::new(provider);
        let blueprint = planner.plan("premise", 10, Language::English).await.unwrap();
        assert_eq!(blueprint.outline[0].start, 1);
        assert_eq!(blueprint.outline.last().unwrap().end, 10);
    }

    #[tokio::test]
    async fn zero_episodes_is_rejected_without_a_model_call() {
        let provider = Arc::new(ScriptedProvider::always("unused"));
        let planner = OutlinePlanner::new(provider.clone());
        let err = planner.plan("premise", 0, Language::English).await.unwrap_err();
        assert!(matches!(err, Error::Planner(PlannerError::InvalidEpisodeCount(0))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn hinglish_request_shapes_the_prompt() {
        let provider = Arc::new(ScriptedProvider::new(vec![good_blueprint_json()]));
        let planner = OutlinePlanner::new(provider.clone());
        planner.plan("premise", 6, Language::Hinglish).await.unwrap();
        let prompts = provider.prompts();
        assert!(prompts[0].contains("Hinglish"));
    }
}
