//! Importance-weighted chunk retrieval.
//!
//! Chunks rank by (importance desc, similarity desc), with (episode,
//! ordinal) as the final tie-break so identical inputs always produce the
//! same result. Anchor-episode pins are merged in before truncation, so a
//! pin is never displaced by rank.

use fableforge_core::Chunk;

use crate::vector::cosine_similarity;

/// Retrieve the chunks most relevant to a query embedding.
///
/// `anchors` lists the pinned episodes (empty disables pinning). Each
/// anchor contributes at most one pin: its most important chunk. Pins are
/// always present in the result when they exist; the remaining slots fill
/// from the ranked list. At most `top_k` chunks are returned unless the
/// pins alone exceed it.
pub fn retrieve_relevant(
    chunks: &[Chunk],
    query_embedding: &[f32],
    top_k: usize,
    anchors: &[u32],
) -> Vec<Chunk> {
    if chunks.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(f32, &Chunk)> = chunks
        .iter()
        .map(|c| (cosine_similarity(&c.embedding, query_embedding), c))
        .collect();
    ranked.sort_by(|(sim_a, a), (sim_b, b)| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| sim_b.partial_cmp(sim_a).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.position().cmp(&b.position()))
    });

    let mut result: Vec<Chunk> = Vec::new();
    for anchor in anchors {
        if let Some(pin) = best_of_episode(chunks, *anchor) {
            if !result.iter().any(|c| c.position() == pin.position()) {
                result.push(pin.clone());
            }
        }
    }

    for (_, chunk) in &ranked {
        if result.len() >= top_k {
            break;
        }
        if !result.iter().any(|c| c.position() == chunk.position()) {
            result.push((*chunk).clone());
        }
    }

    // Stable presentation order for the prompt.
    result.sort_by_key(|c| c.position());
    result
}

/// The episode's most important chunk, earliest ordinal on ties.
fn best_of_episode(chunks: &[Chunk], episode: u32) -> Option<&Chunk> {
    chunks
        .iter()
        .filter(|c| c.episode_number == episode)
        .min_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        })
}
