//! Model-judged validation with bounded targeted regeneration.
//!
//! Each round runs two judgments per episode under review: a TRUE/FALSE
//! continuity check against the predecessor, then a standalone quality
//! check that answers GOOD or returns feedback. Flagged episodes are
//! regenerated in place and only they are re-validated in later rounds;
//! unflagged episodes are never touched. When the round budget runs out
//! with episodes still flagged, the batch commits anyway and the report
//! carries a warning.

use std::sync::Arc;

use async_trait::async_trait;
use fableforge_core::error::Result;
use fableforge_core::provider::{GenerationRequest, LanguageModel};
use fableforge_core::{Character, Episode, EpisodeFeedback, Story};
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;
use crate::generator::EpisodeGenerator;
use crate::prompts;
use crate::refine::{BatchState, BatchWarning, RefinementStrategy, Reviewed};

/// Feedback attached when the continuity check fails; the quality check
/// never runs for that episode in the same round.
const CONTINUITY_FEEDBACK: &str =
    "Restore continuity with the previous episode: facts, character states, and tone must follow on.";

pub struct AutomaticStrategy {
    model: Arc<dyn LanguageModel>,
    generator: EpisodeGenerator,
    max_attempts: u32,
}

impl AutomaticStrategy {
    pub fn new(model: Arc<dyn LanguageModel>, max_attempts: u32) -> Self {
        let generator = EpisodeGenerator::new(model.clone());
        Self { model, generator, max_attempts: max_attempts.max(1) }
    }

    /// One validation round over the episodes listed in `targets`.
    async fn validate(
        &self,
        story: &Story,
        previous: Option<&Episode>,
        episodes: &[Episode],
        targets: &[u32],
    ) -> Result<Vec<EpisodeFeedback>> {
        let mut flagged = Vec::new();
        for episode in episodes.iter().filter(|e| targets.contains(&e.number)) {
            let predecessor = episodes
                .iter()
                .find(|e| e.number + 1 == episode.number)
                .or_else(|| previous.filter(|p| p.number + 1 == episode.number));

            if let Some(prev) = predecessor {
                let verdict = self
                    .model
                    .generate(GenerationRequest::new(prompts::consistency_check(prev, episode)))
                    .await?;
                if verdict.text.to_uppercase().contains("FALSE") {
                    debug!(episode = episode.number, "Continuity check failed");
                    flagged.push(EpisodeFeedback {
                        episode_number: episode.number,
                        feedback: CONTINUITY_FEEDBACK.into(),
                    });
                    continue;
                }
            }

            let review = self
                .model
                .generate(GenerationRequest::new(prompts::quality_check(&story.title, episode)))
                .await?;
            let text = review.text.trim();
            if !text.to_uppercase().starts_with("GOOD") {
                debug!(episode = episode.number, "Quality check returned feedback");
                flagged.push(EpisodeFeedback {
                    episode_number: episode.number,
                    feedback: text.to_string(),
                });
            }
        }
        Ok(flagged)
    }
}

#[async_trait]
impl RefinementStrategy for AutomaticStrategy {
    async fn review(
        &self,
        story: &Story,
        previous: Option<&Episode>,
        characters: &[Character],
        batch: Vec<Episode>,
    ) -> Result<Reviewed> {
        let assembler = ContextAssembler::new();
        let mut episodes = batch;
        let batch_tail = episodes.iter().map(|e| e.number).max().unwrap_or(0);
        let mut targets: Vec<u32> = episodes.iter().map(|e| e.number).collect();
        let mut warnings = Vec::new();

        for attempt in 1..=self.max_attempts {
            debug!(state = %BatchState::Validating, attempt, targets = ?targets, "Validating batch");
            let flagged = self.validate(story, previous, &episodes, &targets).await?;
            if flagged.is_empty() {
                info!(attempt, episodes = episodes.len(), "Batch validated");
                return Ok(Reviewed { episodes, warnings, approve: true });
            }

            if attempt == self.max_attempts {
                let numbers: Vec<u32> = flagged.iter().map(|f| f.episode_number).collect();
                warn!(
                    attempts = attempt,
                    episodes = ?numbers,
                    "Retry budget exhausted with episodes still flagged, committing as-is"
                );
                warnings.push(BatchWarning::RetryBudgetExhausted {
                    attempts: attempt,
                    episodes: numbers,
                });
                break;
            }

            debug!(state = %BatchState::NeedsRefinement, flagged = flagged.len(), "Regenerating flagged episodes");
            for item in &flagged {
                let index = episodes
                    .iter()
                    .position(|e| e.number == item.episode_number);
                let Some(index) = index else { continue };

                let previous_summary = episodes
                    .iter()
                    .find(|e| e.number + 1 == item.episode_number)
                    .or_else(|| previous.filter(|p| p.number + 1 == item.episode_number))
                    .map(|e| e.summary.clone());
                let ctx = assembler.assemble(
                    story,
                    item.episode_number,
                    &[],
                    characters,
                    &[],
                    &[],
                );
                let replacement = self
                    .generator
                    .regenerate(
                        &ctx,
                        &episodes[index],
                        &item.feedback,
                        previous_summary.as_deref(),
                        item.episode_number == batch_tail,
                    )
                    .await?;
                episodes[index] = replacement;
            }
            targets = flagged.iter().map(|f| f.episode_number).collect();
        }

        Ok(Reviewed { episodes, warnings, approve: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::Utc;
    use fableforge_core::story::{Phase, PhaseSegment, StoryId};
    use fableforge_core::{Language, RefinementMode};
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
            num_episodes: 6,
            current_episode: 1,
            outline: vec![PhaseSegment {
                start: 1,
                end: 6,
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

    fn episode(number: u32, content: &str) -> Episode {
        let mut e = Episode::placeholder(number);
        e.content = content.into();
        e.summary = format!("summary {number}");
        e
    }

    #[tokio::test]
    async fn clean_batch_passes_in_one_round() {
        // Ep 1 has no predecessor: quality only. Ep 2: consistency, quality.
        let provider = Arc::new(ScriptedProvider::from_strs(&["GOOD", "TRUE", "GOOD"]));
        let strategy = AutomaticStrategy::new(provider.clone(), 3);
        let batch = vec![episode(1, "a"), episode(2, "b")];
        let reviewed = strategy.review(&story(), None, &[], batch).await.unwrap();

        assert!(reviewed.approve);
        assert!(reviewed.warnings.is_empty());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn flagged_episode_regenerates_and_only_it_revalidates() {
        let provider = Arc::new(ScriptedProvider::from_strs(&[
            // Round 1: ep1 quality, ep2 consistency + quality (flagged).
            "GOOD",
            "TRUE",
            "Needs more tension in the middle.",
            // Regeneration of ep2: draft + annotations.
            r#"{ "title": "Storm Glass", "content": "The sea turned without warning." }"#,
            r#"{ "summary": "The sea turns.", "emotional_state": "tense" }"#,
            // Round 2: only ep2. Consistency + quality.
            "TRUE",
            "GOOD",
        ]));
        let strategy = AutomaticStrategy::new(provider.clone(), 3);
        let batch = vec![episode(1, "calm prose"), episode(2, "flat prose")];
        let reviewed = strategy.review(&story(), None, &[], batch).await.unwrap();

        assert!(reviewed.approve);
        assert!(reviewed.warnings.is_empty());
        assert_eq!(reviewed.episodes[0].content, "calm prose");
        assert_eq!(reviewed.episodes[1].content, "The sea turned without warning.");
        assert_eq!(provider.call_count(), 7);
    }

    #[tokio::test]
    async fn continuity_failure_skips_the_quality_check() {
        let provider = Arc::new(ScriptedProvider::from_strs(&[
            "GOOD",  // ep1 quality
            "FALSE", // ep2 consistency, quality skipped
            // Regeneration of ep2.
            r#"{ "title": "T", "content": "Mended continuity." }"#,
            r#"{ "summary": "S.", "emotional_state": "calm" }"#,
            // Round 2: ep2 only.
            "TRUE",
            "GOOD",
        ]));
        let strategy = AutomaticStrategy::new(provider.clone(), 3);
        let batch = vec![episode(1, "a"), episode(2, "b")];
        let reviewed = strategy.review(&story(), None, &[], batch).await.unwrap();
        assert!(reviewed.approve);
        assert_eq!(reviewed.episodes[1].content, "Mended continuity.");
        assert_eq!(provider.call_count(), 6);
    }

    #[tokio::test]
    async fn exhausted_budget_commits_with_a_warning() {
        let provider = Arc::new(ScriptedProvider::from_strs(&[
            "Too flat.", // round 1: ep1 quality
            r#"{ "title": "T", "content": "Second try." }"#,
            r#"{ "summary": "S.", "emotional_state": "calm" }"#,
            "Still flat.", // round 2 (final): ep1 quality
        ]));
        let strategy = AutomaticStrategy::new(provider.clone(), 2);
        let batch = vec![episode(1, "first try")];
        let reviewed = strategy.review(&story(), None, &[], batch).await.unwrap();

        assert!(reviewed.approve);
        assert_eq!(
            reviewed.warnings,
            vec![BatchWarning::RetryBudgetExhausted { attempts: 2, episodes: vec![1] }]
        );
        assert_eq!(reviewed.episodes[0].content, "Second try.");
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn committed_predecessor_enables_the_continuity_check() {
        let provider = Arc::new(ScriptedProvider::from_strs(&["TRUE", "GOOD"]));
        let strategy = AutomaticStrategy::new(provider.clone(), 3);
        let committed = episode(3, "earlier");
        let batch = vec![episode(4, "later")];
        let reviewed = strategy
            .review(&story(), Some(&committed), &[], batch)
            .await
            .unwrap();
        assert!(reviewed.approve);
        assert_eq!(provider.call_count(), 2);
    }
}
