//! Human-in-the-loop refinement.
//!
//! The strategy itself only parks the batch; all editing happens later
//! through [`FeedbackInterpreter`], which classifies a free-text
//! instruction into one concrete edit and applies it to the one episode it
//! targets. Nothing commits until an explicit validate call.

use std::sync::Arc;

use async_trait::async_trait;
use fableforge_core::error::Result;
use fableforge_core::provider::{GenerationRequest, LanguageModel};
use fableforge_core::{extract_object, Character, Episode, Story};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::prompts;
use crate::refine::{BatchState, RefinementStrategy, Reviewed};

/// Parks every batch for explicit human validation.
pub struct HumanStrategy;

#[async_trait]
impl RefinementStrategy for HumanStrategy {
    async fn review(
        &self,
        story: &Story,
        _previous: Option<&Episode>,
        _characters: &[Character],
        batch: Vec<Episode>,
    ) -> Result<Reviewed> {
        info!(
            story = %story.id,
            state = %BatchState::Generated,
            episodes = batch.len(),
            "Batch parked for human validation"
        );
        Ok(Reviewed { episodes: batch, warnings: Vec::new(), approve: false })
    }
}

/// One concrete edit derived from a human instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Set the title to the given text.
    ReplaceTitle { title: String },
    /// Have the model propose a title.
    AiTitle,
    /// Replace the first occurrence of a line verbatim.
    ReplaceLine { old: String, new: String },
    /// Rewrite one line in a requested style.
    ImproveLine { line: String, style: String },
    /// Rewrite the whole episode in a requested style.
    StyleEnhance { style: String },
    /// Any other content change, driven by the raw instruction.
    ContentEdit,
}

/// Classifies and applies human feedback to a pending episode.
pub struct FeedbackInterpreter {
    model: Arc<dyn LanguageModel>,
}

impl FeedbackInterpreter {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Classify an instruction into a [`ChangeKind`].
    pub async fn interpret(&self, instruction: &str, episode: &Episode) -> Result<ChangeKind> {
        let completion = self
            .model
            .generate(GenerationRequest::new(prompts::interpret_feedback(instruction, episode)))
            .await?;

        let extracted = extract_object::<RawChange>(
            &completion.text,
            &["kind", "title", "old_line", "new_line", "line", "style"],
            json!({ "kind": "content_edit", "title": "", "old_line": "", "new_line": "", "line": "", "style": "" }),
        )?;
        let raw = extracted.value;

        let change = match raw.kind.as_str() {
            "replace_title" if !raw.title.trim().is_empty() => {
                ChangeKind::ReplaceTitle { title: raw.title.trim().to_string() }
            }
            "ai_title" => ChangeKind::AiTitle,
            "replace_line" if !raw.old_line.is_empty() => {
                ChangeKind::ReplaceLine { old: raw.old_line, new: raw.new_line }
            }
            "improve_line" if !raw.line.is_empty() => {
                ChangeKind::ImproveLine { line: raw.line, style: raw.style }
            }
            "style_enhance" if !raw.style.trim().is_empty() => {
                ChangeKind::StyleEnhance { style: raw.style.trim().to_string() }
            }
            _ => ChangeKind::ContentEdit,
        };
        debug!(episode = episode.number, change = ?change, "Interpreted feedback");
        Ok(change)
    }

    /// Apply a classified change to the episode.
    ///
    /// `instruction` is the original free text, used when the change needs
    /// a full rewrite.
    pub async fn apply(
        &self,
        episode: &mut Episode,
        change: ChangeKind,
        instruction: &str,
    ) -> Result<()> {
        match change {
            ChangeKind::ReplaceTitle { title } => {
                episode.title = title;
            }
            ChangeKind::AiTitle => {
                let completion = self
                    .model
                    .generate(GenerationRequest::new(prompts::propose_title(&episode.content)))
                    .await?;
                let title = strip_decorations(&completion.text);
                if !title.is_empty() {
                    episode.title = title;
                }
            }
            ChangeKind::ReplaceLine { old, new } => {
                if episode.content.contains(&old) {
                    episode.content = episode.content.replacen(&old, &new, 1);
                } else {
                    warn!(episode = episode.number, "Line to replace not found, leaving content as-is");
                }
            }
            ChangeKind::ImproveLine { line, style } => {
                let completion = self
                    .model
                    .generate(GenerationRequest::new(prompts::improve_line(&line, &style)))
                    .await?;
                let rewritten = strip_decorations(&completion.text);
                if !rewritten.is_empty() && episode.content.contains(&line) {
                    episode.content = episode.content.replacen(&line, &rewritten, 1);
                } else if !episode.content.contains(&line) {
                    warn!(episode = episode.number, "Line to improve not found, leaving content as-is");
                }
            }
            ChangeKind::StyleEnhance { style } => {
                let prompt = prompts::rewrite_content(
                    &episode.content,
                    &format!("Rewrite in this style: {style}"),
                );
                let completion = self.model.generate(GenerationRequest::new(prompt)).await?;
                let rewritten = strip_decorations(&completion.text);
                if !rewritten.is_empty() {
                    episode.content = rewritten;
                }
            }
            ChangeKind::ContentEdit => {
                let prompt = prompts::rewrite_content(&episode.content, instruction);
                let completion = self.model.generate(GenerationRequest::new(prompt)).await?;
                let rewritten = strip_decorations(&completion.text);
                if !rewritten.is_empty() {
                    episode.content = rewritten;
                }
            }
        }
        Ok(())
    }
}

/// Trim whitespace, surrounding quotes, and code fences from a short
/// model response.
fn strip_decorations(text: &str) -> String {
    let mut s = text.trim();
    if let Some(inner) = s.strip_prefix("```") {
        let inner = inner.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        s = inner.trim_end_matches("```").trim();
    }
    s.trim_matches('"').trim().to_string()
}

#[derive(Debug, Deserialize)]
struct RawChange {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    old_line: String,
    #[serde(default)]
    new_line: String,
    #[serde(default)]
    line: String,
    #[serde(default)]
    style: String,
}
