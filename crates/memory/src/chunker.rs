//! Semantic chunking of episode prose.
//!
//! Sentences are embedded with a one-neighbor buffer on each side, and a
//! chunk boundary is placed wherever the cosine distance between adjacent
//! windows exceeds the configured percentile of all adjacent distances.
//! Single-sentence texts fall back to fixed-size splitting.
//!
//! Each chunk's importance is the number of tagged-character mentions plus
//! a bonus when its episode is a foundational anchor.

use std::sync::Arc;

use fableforge_core::error::ProviderError;
use fableforge_core::provider::EmbeddingModel;
use fableforge_core::story::StoryId;
use fableforge_core::Chunk;
use tracing::debug;

use crate::vector::{cosine_distance, percentile};

/// Character window for the single-sentence fallback.
const FALLBACK_CHUNK_CHARS: usize = 1000;

/// Episodes whose chunks carry the anchor bonus and are pinned in
/// retrieval: the premiere and the midpoint. Collapses to `{1}` for
/// one-episode stories.
pub fn anchor_episodes(num_episodes: u32) -> Vec<u32> {
    let midpoint = ((num_episodes as f32) * 0.5).floor() as u32;
    let mut anchors = vec![1];
    if midpoint > 1 {
        anchors.push(midpoint);
    }
    anchors
}

/// Splits episode text into embedded, importance-scored chunks.
pub struct SemanticChunker {
    embedder: Arc<dyn EmbeddingModel>,
    breakpoint_percentile: f32,
    anchor_bonus: f32,
}

impl SemanticChunker {
    pub fn new(embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            embedder,
            breakpoint_percentile: 95.0,
            anchor_bonus: 2.0,
        }
    }

    pub fn with_breakpoint_percentile(mut self, pct: f32) -> Self {
        self.breakpoint_percentile = pct;
        self
    }

    pub fn with_anchor_bonus(mut self, bonus: f32) -> Self {
        self.anchor_bonus = bonus;
        self
    }

    /// Chunk one episode's content.
    ///
    /// `tagged_characters` are the names featured in the episode;
    /// `is_anchor` marks the episode as foundational for scoring.
    pub async fn chunk_episode(
        &self,
        story_id: StoryId,
        episode_number: u32,
        content: &str,
        tagged_characters: &[String],
        is_anchor: bool,
    ) -> std::result::Result<Vec<Chunk>, ProviderError> {
        let pieces = self.split(content).await?;

        let mut chunks = Vec::with_capacity(pieces.len());
        let embeddings = self.embedder.embed_batch(&pieces).await?;
        for (ordinal, (content, embedding)) in pieces.into_iter().zip(embeddings).enumerate() {
            let mentioned: Vec<String> = tagged_characters
                .iter()
                .filter(|name| mention_count(&content, name) > 0)
                .cloned()
                .collect();
            let mentions: usize = tagged_characters
                .iter()
                .map(|name| mention_count(&content, name))
                .sum();
            let importance =
                mentions as f32 + if is_anchor { self.anchor_bonus } else { 0.0 };

            chunks.push(Chunk {
                story_id,
                episode_number,
                ordinal: ordinal as u32,
                content,
                embedding,
                importance,
                characters: mentioned,
            });
        }

        debug!(episode = episode_number, chunks = chunks.len(), "Chunked episode");
        Ok(chunks)
    }

    /// Split text into semantically-coherent pieces.
    async fn split(&self, text: &str) -> std::result::Result<Vec<String>, ProviderError> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(Vec::new());
        }
        if sentences.len() == 1 {
            return Ok(fixed_size_split(&sentences[0], FALLBACK_CHUNK_CHARS));
        }

        // One-neighbor buffered windows smooth out single-sentence noise.
        let windows: Vec<String> = (0..sentences.len())
            .map(|i| {
                let start = i.saturating_sub(1);
                let end = (i + 1).min(sentences.len() - 1);
                sentences[start..=end].join(" ")
            })
            .collect();

        let embeddings = self.embedder.embed_batch(&windows).await?;

        let distances: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| cosine_distance(&pair[0], &pair[1]))
            .collect();
        let threshold = percentile(&distances, self.breakpoint_percentile);

        let mut pieces = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for (i, sentence) in sentences.iter().enumerate() {
            current.push(sentence);
            let breaks_here = i < distances.len() && distances[i] > threshold;
            if breaks_here {
                pieces.push(current.join(" "));
                current.clear();
            }
        }
        if !current.is_empty() {
            pieces.push(current.join(" "));
        }
        Ok(pieces)
    }
}

/// Split prose into sentences on terminal punctuation followed by
/// whitespace. Keeps the punctuation with its sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            // Swallow runs like "?!" or "..." before checking the boundary.
            while let Some(&next) = chars.peek() {
                if matches!(next, '.' | '!' | '?' | '"' | '\u{201d}' | '\'') {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            match chars.peek() {
                Some(&next) if next.is_whitespace() => {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        sentences.push(trimmed.to_string());
                    }
                    current.clear();
                }
                None => {}
                _ => {}
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Fixed-size split at word boundaries, for texts with no sentence
/// structure to exploit.
fn fixed_size_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Count case-insensitive whole-word occurrences of `name` in `text`.
fn mention_count(text: &str, name: &str) -> usize {
    if name.is_empty() {
        return 0;
    }
    let text_lower = text.to_lowercase();
    let name_lower = name.to_lowercase();
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = text_lower[start..].find(&name_lower) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !text_lower[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + name_lower.len();
        let after_ok = after >= text_lower.len()
            || !text_lower[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            count += 1;
        }
        start = abs + name_lower.len();
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use fableforge_providers::HashEmbedder;

    fn chunker() -> SemanticChunker {
        SemanticChunker::new(Arc::new(HashEmbedder::default()))
    }

    #[test]
    fn anchors_are_premiere_and_midpoint() {
        assert_eq!(anchor_episodes(10), vec![1, 5]);
        assert_eq!(anchor_episodes(7), vec![1, 3]);
        assert_eq!(anchor_episodes(2), vec![1]);
        assert_eq!(anchor_episodes(1), vec![1]);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        let text = "Mira ran. The door slammed! Was it locked? She waited.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 4);
        assert_eq!(sentences[0], "Mira ran.");
        assert_eq!(sentences[2], "Was it locked?");
    }

    #[test]
    fn sentences_keep_quotes_and_ellipses_together() {
        let text = r#"She said "stop!" Then silence... Nothing moved."#;
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], r#"She said "stop!""#);
        assert_eq!(sentences[1], "Then silence...");
    }

    #[test]
    fn fixed_split_respects_word_boundaries() {
        let text = "alpha beta gamma delta";
        let pieces = fixed_size_split(text, 11);
        assert_eq!(pieces, vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn mention_counting_is_whole_word() {
        assert_eq!(mention_count("Mira met Miranda. Mira left.", "Mira"), 2);
        assert_eq!(mention_count("mira, MIRA!", "Mira"), 2);
        assert_eq!(mention_count("nothing here", "Mira"), 0);
    }

    #[tokio::test]
    async fn chunking_covers_all_content() {
        let text = "Mira crossed the bridge at dawn. The river below was silver. \
                    Meanwhile the council voted on the tax. The treasury was empty. \
                    Far away a storm gathered over the sea. Sailors watched the sky.";
        let chunks = chunker()
            .chunk_episode(StoryId::new(), 1, text, &["Mira".into()], false)
            .await
            .unwrap();
        assert!(!chunks.is_empty());
        let rejoined: String = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
        assert!(rejoined.contains("Mira crossed the bridge"));
        assert!(rejoined.contains("Sailors watched the sky."));
        // Ordinals are dense and start at zero.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i as u32);
        }
    }

    #[tokio::test]
    async fn anchor_bonus_raises_importance() {
        let text = "Mira spoke. Mira listened.";
        let plain = chunker()
            .chunk_episode(StoryId::new(), 3, text, &["Mira".into()], false)
            .await
            .unwrap();
        let anchored = chunker()
            .chunk_episode(StoryId::new(), 1, text, &["Mira".into()], true)
            .await
            .unwrap();
        assert!((anchored[0].importance - plain[0].importance - 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn single_sentence_uses_fixed_fallback() {
        let long_sentence = format!("word {}", "and more ".repeat(300));
        let chunks = chunker()
            .chunk_episode(StoryId::new(), 1, &long_sentence, &[], false)
            .await
            .unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.len() <= FALLBACK_CHUNK_CHARS));
    }

    #[tokio::test]
    async fn mentioned_characters_are_tagged() {
        let text = "Mira met Dev at the gate. They argued. The gate closed.";
        let chunks = chunker()
            .chunk_episode(
                StoryId::new(),
                2,
                text,
                &["Mira".into(), "Dev".into(), "Sana".into()],
                false,
            )
            .await
            .unwrap();
        let tagged: Vec<&String> = chunks.iter().flat_map(|c| &c.characters).collect();
        assert!(tagged.iter().any(|n| n.as_str() == "Mira"));
        assert!(tagged.iter().any(|n| n.as_str() == "Dev"));
        assert!(!tagged.iter().any(|n| n.as_str() == "Sana"));
    }
}
