//! The story pipeline.
//!
//! One orchestrator wires the planner, the context assembler, the
//! two-stage generator, the refinement strategies, the quota gate, and the
//! store. Quota is reserved before any model call; episodes in a batch
//! generate sequentially so each one sees its in-batch predecessors; chunk
//! ingestion runs detached after commit so a slow embedder never blocks
//! the response.

use std::sync::Arc;

use chrono::Utc;
use fableforge_core::error::{Error, Result};
use fableforge_core::provider::{EmbeddingModel, GenerationRequest, LanguageModel};
use fableforge_core::quota::GenerationGate;
use fableforge_core::{
    Character, Episode, FeedbackItem, Language, OwnerId, RefinementMode, Story, StoryId,
    StoryStore,
};
use fableforge_memory::{anchor_episodes, SemanticChunker};
use fableforge_planner::OutlinePlanner;
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;
use crate::generator::EpisodeGenerator;
use crate::mutator;
use crate::prompts;
use crate::refine::{
    AutomaticStrategy, BatchState, BatchWarning, FeedbackInterpreter, HumanStrategy,
    RefinementStrategy,
};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Default episodes per batch when the caller does not ask for a size.
    pub batch_size: u32,
    /// Validation rounds per batch in automatic mode.
    pub max_attempts: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Committed episodes recapped before each generation.
    pub recap_window: usize,
    /// Memory chunks retrieved per episode prompt.
    pub top_k: usize,
    pub pin_anchors: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            max_attempts: 3,
            temperature: 0.7,
            max_tokens: 8192,
            recap_window: 3,
            top_k: 5,
            pin_anchors: true,
        }
    }
}

impl PipelineConfig {
    /// Lift the relevant knobs out of the application config.
    pub fn from_app(config: &fableforge_config::AppConfig) -> Self {
        Self {
            batch_size: config.generation.batch_size,
            max_attempts: config.generation.max_attempts,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            recap_window: config.generation.recap_window as usize,
            top_k: config.retrieval.top_k,
            pin_anchors: config.retrieval.pin_anchors,
        }
    }
}

/// What one generation or validation call produced.
#[derive(Debug)]
pub struct BatchReport {
    pub story_id: StoryId,
    pub state: BatchState,
    pub episodes: Vec<Episode>,
    pub warnings: Vec<BatchWarning>,
}

/// End-to-end orchestration of story creation, batch generation,
/// feedback, and validation.
pub struct StoryPipeline {
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<dyn StoryStore>,
    gate: Arc<dyn GenerationGate>,
    chunker: Arc<SemanticChunker>,
    generator: EpisodeGenerator,
    assembler: ContextAssembler,
    interpreter: FeedbackInterpreter,
    config: PipelineConfig,
}

impl StoryPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<dyn StoryStore>,
        gate: Arc<dyn GenerationGate>,
    ) -> Self {
        Self::with_config(model, embedder, store, gate, PipelineConfig::default())
    }

    pub fn with_config(
        model: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<dyn StoryStore>,
        gate: Arc<dyn GenerationGate>,
        config: PipelineConfig,
    ) -> Self {
        let generator = EpisodeGenerator::new(model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);
        let assembler = ContextAssembler::new()
            .with_recap_window(config.recap_window)
            .with_top_k(config.top_k)
            .with_pin_anchors(config.pin_anchors);
        let interpreter = FeedbackInterpreter::new(model.clone());
        let chunker = Arc::new(SemanticChunker::new(embedder.clone()));
        Self { model, embedder, store, gate, chunker, generator, assembler, interpreter, config }
    }

    // --- Story lifecycle ---

    /// Plan and persist a new story from a premise.
    pub async fn create_story(
        &self,
        owner: &OwnerId,
        premise: &str,
        num_episodes: u32,
        language: Language,
        refinement: RefinementMode,
    ) -> Result<Story> {
        let planner = OutlinePlanner::new(self.model.clone())
            .with_temperature(self.config.temperature);
        let blueprint = planner.plan(premise, num_episodes, language).await?;

        let now = Utc::now();
        let story = Story {
            id: StoryId::new(),
            title: blueprint.title,
            genre: blueprint.genre,
            summary: None,
            settings: blueprint.settings,
            protagonists: blueprint.protagonists,
            special_instructions: blueprint.special_instructions,
            theme: blueprint.theme,
            num_episodes,
            current_episode: 1,
            outline: blueprint.outline,
            key_events: Default::default(),
            timeline: Vec::new(),
            pending_batch: Vec::new(),
            is_completed: false,
            language,
            refinement,
            created_at: now,
            updated_at: now,
        };

        self.store.create_story(owner, &story).await?;
        for character in &blueprint.characters {
            self.store.upsert_character(owner, story.id, character).await?;
        }
        info!(story = %story.id, title = %story.title, episodes = num_episodes, "Created story");
        Ok(story)
    }

    pub async fn get_story(&self, owner: &OwnerId, id: StoryId) -> Result<Story> {
        Ok(self.store.get_story(owner, id).await?)
    }

    pub async fn list_stories(&self, owner: &OwnerId) -> Result<Vec<Story>> {
        Ok(self.store.list_stories(owner).await?)
    }

    pub async fn delete_story(&self, owner: &OwnerId, id: StoryId) -> Result<()> {
        self.store.delete_story(owner, id).await?;
        info!(story = %id, "Deleted story");
        Ok(())
    }

    // --- Generation ---

    /// Generate the next batch of episodes.
    ///
    /// Returns a `Committed` report in automatic mode, a `Generated`
    /// report when the batch parks for human validation, and a
    /// `NeedsRefinement` report echoing the pending batch when one is
    /// already parked.
    pub async fn generate_batch(
        &self,
        owner: &OwnerId,
        id: StoryId,
        batch_size: Option<u32>,
    ) -> Result<BatchReport> {
        let mut story = self.store.get_story(owner, id).await?;

        if !story.pending_batch.is_empty() {
            info!(story = %id, "A pending batch is awaiting validation");
            return Ok(BatchReport {
                story_id: id,
                state: BatchState::NeedsRefinement,
                episodes: story.pending_batch,
                warnings: Vec::new(),
            });
        }
        let remaining = story.remaining_episodes();
        if story.is_completed || remaining == 0 {
            info!(story = %id, "Story is already complete");
            return Ok(BatchReport {
                story_id: id,
                state: BatchState::Committed,
                episodes: Vec::new(),
                warnings: Vec::new(),
            });
        }

        let effective = batch_size.unwrap_or(self.config.batch_size).max(1).min(remaining);
        self.gate.reserve(owner, effective).await?;

        let first = story.current_episode;
        let recap_from = first.saturating_sub(self.config.recap_window as u32).max(1);
        let committed_recent = if first > 1 {
            self.store.episodes_in_range(owner, id, recap_from, first - 1).await?
        } else {
            Vec::new()
        };
        let characters = self.store.characters(owner, id).await?;
        let chunks = self.store.all_chunks(owner, id).await?;

        let mut batch: Vec<Episode> = Vec::with_capacity(effective as usize);
        for offset in 0..effective {
            let number = first + offset;
            let prior: Vec<Episode> = committed_recent
                .iter()
                .chain(batch.iter())
                .cloned()
                .collect();

            let query = retrieval_query(&story, number, prior.last());
            let query_embedding = self.embedder.embed(&query).await?;
            let ctx = self.assembler.assemble(
                &story,
                number,
                &prior,
                &characters,
                &chunks,
                &query_embedding,
            );
            debug!(story = %id, episode = number, phase = %ctx.phase, "Generating episode");
            batch.push(self.generator.generate(&ctx).await?);
        }

        let previous = committed_recent.last();
        let strategy: Box<dyn RefinementStrategy> = match story.refinement {
            RefinementMode::Automatic => {
                Box::new(AutomaticStrategy::new(self.model.clone(), self.config.max_attempts))
            }
            RefinementMode::Human => Box::new(HumanStrategy),
        };
        let reviewed = strategy.review(&story, previous, &characters, batch).await?;

        if reviewed.approve {
            let episodes =
                self.commit(owner, &mut story, &characters, reviewed.episodes).await?;
            Ok(BatchReport {
                story_id: id,
                state: BatchState::Committed,
                episodes,
                warnings: reviewed.warnings,
            })
        } else {
            story.pending_batch = reviewed.episodes.clone();
            story.updated_at = Utc::now();
            self.store.update_story(owner, &story).await?;
            Ok(BatchReport {
                story_id: id,
                state: BatchState::Generated,
                episodes: reviewed.episodes,
                warnings: reviewed.warnings,
            })
        }
    }

    // --- Human validation ---

    /// Apply human feedback to episodes parked in the pending batch.
    pub async fn apply_feedback(
        &self,
        owner: &OwnerId,
        id: StoryId,
        items: &[FeedbackItem],
    ) -> Result<Story> {
        let mut story = self.store.get_story(owner, id).await?;
        if story.pending_batch.is_empty() {
            return Err(Error::Internal(format!("story {id} has no pending batch")));
        }

        for item in items {
            let index = story
                .pending_batch
                .iter()
                .position(|e| e.number == item.episode_number)
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "episode {} is not in the pending batch",
                        item.episode_number
                    ))
                })?;

            let mut episode = story.pending_batch[index].clone();
            let change = self.interpreter.interpret(&item.instruction, &episode).await?;
            self.interpreter.apply(&mut episode, change, &item.instruction).await?;
            story.pending_batch[index] = episode;
            info!(story = %id, episode = item.episode_number, "Applied feedback");
        }

        story.updated_at = Utc::now();
        self.store.update_story(owner, &story).await?;
        Ok(story)
    }

    /// Commit the pending batch after human review.
    pub async fn validate_batch(&self, owner: &OwnerId, id: StoryId) -> Result<BatchReport> {
        let mut story = self.store.get_story(owner, id).await?;
        if story.pending_batch.is_empty() {
            return Err(Error::Internal(format!("story {id} has no pending batch")));
        }

        let batch = std::mem::take(&mut story.pending_batch);
        let characters = self.store.characters(owner, id).await?;
        let episodes = self.commit(owner, &mut story, &characters, batch).await?;
        Ok(BatchReport {
            story_id: id,
            state: BatchState::Committed,
            episodes,
            warnings: Vec::new(),
        })
    }

    // --- Summary ---

    /// Regenerate the story's spoiler-free teaser from committed episodes.
    pub async fn refresh_summary(&self, owner: &OwnerId, id: StoryId) -> Result<String> {
        let mut story = self.store.get_story(owner, id).await?;
        if story.current_episode <= 1 {
            return Err(Error::Internal(format!("story {id} has no committed episodes")));
        }
        let episodes = self
            .store
            .episodes_in_range(owner, id, 1, story.current_episode - 1)
            .await?;
        let summaries: Vec<String> = episodes.iter().map(|e| e.summary.clone()).collect();

        let completion = self
            .model
            .generate(GenerationRequest::new(prompts::teaser(&story.title, &summaries)))
            .await?;
        let teaser = completion.text.trim().to_string();
        story.summary = Some(teaser.clone());
        story.updated_at = Utc::now();
        self.store.update_story(owner, &story).await?;
        Ok(teaser)
    }

    // --- Internals ---

    async fn commit(
        &self,
        owner: &OwnerId,
        story: &mut Story,
        characters: &[Character],
        batch: Vec<Episode>,
    ) -> Result<Vec<Episode>> {
        // Episodes land before the story pointer. If the process dies in
        // between, the unadvanced pointer hides the orphan rows: the next
        // batch regenerates the same numbers and put_episodes overwrites
        // them key-by-key.
        self.store.put_episodes(owner, story.id, &batch).await?;

        let updated = mutator::apply_commit(story, characters, &batch, Utc::now());
        for character in &updated {
            self.store.upsert_character(owner, story.id, character).await?;
        }
        self.store.update_story(owner, story).await?;
        info!(
            story = %story.id,
            state = %BatchState::Committed,
            episodes = batch.len(),
            current_episode = story.current_episode,
            "Committed batch"
        );

        self.spawn_ingestion(owner.clone(), story, &batch);
        Ok(batch)
    }

    /// Chunk and embed the committed episodes off the request path.
    fn spawn_ingestion(&self, owner: OwnerId, story: &Story, batch: &[Episode]) {
        let store = self.store.clone();
        let chunker = self.chunker.clone();
        let story_id = story.id;
        let anchors = anchor_episodes(story.num_episodes);
        let episodes: Vec<(u32, String, Vec<String>)> = batch
            .iter()
            .map(|e| {
                (
                    e.number,
                    e.content.clone(),
                    e.featured_names().iter().map(|n| n.to_string()).collect(),
                )
            })
            .collect();

        tokio::spawn(async move {
            for (number, content, names) in episodes {
                let is_anchor = anchors.contains(&number);
                match chunker
                    .chunk_episode(story_id, number, &content, &names, is_anchor)
                    .await
                {
                    Ok(chunks) => {
                        if let Err(error) = store.put_chunks(&owner, story_id, &chunks).await {
                            warn!(story = %story_id, episode = number, %error, "Failed to store chunks");
                        }
                    }
                    Err(error) => {
                        warn!(story = %story_id, episode = number, %error, "Failed to chunk episode");
                    }
                }
            }
        });
    }
}

/// Text embedded as the retrieval query for an episode: where the outline
/// says the story is going, plus where it just was.
fn retrieval_query(story: &Story, number: u32, last: Option<&Episode>) -> String {
    let mut query = format!("{} {}", story.title, story.phase_for(number).label());
    if let Some(segment) = story.segment_for(number) {
        if !segment.description.is_empty() {
            query.push(' ');
            query.push_str(&segment.description);
        }
    }
    if let Some(episode) = last {
        query.push(' ');
        query.push_str(&episode.summary);
    }
    query
}
