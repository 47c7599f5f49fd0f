//! Outline normalization.
//!
//! Model-proposed phase segments arrive in any shape: gaps, overlaps,
//! reversed bounds, out-of-range episodes. Normalization repairs every
//! violation so the result is contiguous, ordered, and covers exactly
//! `[1, num_episodes]`. Repairs warn; they never fail.

use fableforge_core::story::{Phase, PhaseSegment};
use tracing::warn;

/// Repair `segments` into a well-formed outline over `[1, num_episodes]`.
///
/// An empty or unusable proposal falls back to [`fallback_outline`].
pub fn normalize_outline(segments: Vec<PhaseSegment>, num_episodes: u32) -> Vec<PhaseSegment> {
    if num_episodes == 0 {
        return Vec::new();
    }

    let mut proposed: Vec<PhaseSegment> = segments
        .into_iter()
        .map(|mut s| {
            if s.start > s.end {
                warn!(start = s.start, end = s.end, "Outline segment reversed, swapping bounds");
                std::mem::swap(&mut s.start, &mut s.end);
            }
            s
        })
        .filter(|s| {
            if s.start > num_episodes {
                warn!(start = s.start, "Outline segment past the final episode, dropping");
                false
            } else {
                true
            }
        })
        .collect();
    proposed.sort_by_key(|s| (s.start, s.end));

    let mut outline: Vec<PhaseSegment> = Vec::new();
    let mut next = 1u32;
    for mut segment in proposed {
        if next > num_episodes {
            warn!(phase = %segment.phase, "Outline already complete, dropping trailing segment");
            continue;
        }
        if segment.end < next {
            warn!(phase = %segment.phase, "Outline segment fully overlapped, dropping");
            continue;
        }
        if segment.start != next {
            warn!(
                expected = next,
                got = segment.start,
                "Outline segment misaligned, clipping to keep coverage contiguous"
            );
        }
        segment.start = next;
        segment.end = segment.end.min(num_episodes);
        next = segment.end + 1;
        outline.push(segment);
    }

    if outline.is_empty() {
        warn!(num_episodes, "No usable outline segments, using the fallback arc");
        return fallback_outline(num_episodes);
    }

    let last_end = outline.last().map(|s| s.end).unwrap_or(0);
    if last_end < num_episodes {
        warn!(
            covered = last_end,
            num_episodes, "Outline short of the final episode, extending last segment"
        );
        if let Some(last) = outline.last_mut() {
            last.end = num_episodes;
        }
    }

    merge_adjacent(outline)
}

/// Merge neighboring segments that share a phase.
fn merge_adjacent(outline: Vec<PhaseSegment>) -> Vec<PhaseSegment> {
    let mut merged: Vec<PhaseSegment> = Vec::with_capacity(outline.len());
    for segment in outline {
        match merged.last_mut() {
            Some(prev) if prev.phase == segment.phase => {
                prev.end = segment.end;
                if prev.description.is_empty() {
                    prev.description = segment.description;
                }
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// The phases a story of `num_episodes` can carry. Short stories collapse
/// middle phases but keep the initial and terminal ones.
fn phases_for_count(num_episodes: u32) -> Vec<Phase> {
    match num_episodes {
        0 => Vec::new(),
        1 => vec![Phase::Exposition],
        2 => vec![Phase::Exposition, Phase::Denouement],
        3 => vec![Phase::Exposition, Phase::Climax, Phase::Denouement],
        4 => vec![
            Phase::Exposition,
            Phase::IncitingIncident,
            Phase::Climax,
            Phase::Denouement,
        ],
        5 => vec![
            Phase::Exposition,
            Phase::IncitingIncident,
            Phase::RisingAction,
            Phase::Climax,
            Phase::Denouement,
        ],
        _ => Phase::ALL.to_vec(),
    }
}

/// An evenly-distributed default outline. Extra episodes go to the middle
/// phases, never the opening or the ending.
pub fn fallback_outline(num_episodes: u32) -> Vec<PhaseSegment> {
    let phases = phases_for_count(num_episodes);
    if phases.is_empty() {
        return Vec::new();
    }

    let k = phases.len();
    let base = num_episodes as usize / k;
    let mut sizes = vec![base; k];
    let mut rem = num_episodes as usize % k;
    let order: Vec<usize> = if k > 2 { (1..k - 1).collect() } else { (0..k).collect() };
    let mut i = 0;
    while rem > 0 {
        sizes[order[i % order.len()]] += 1;
        i += 1;
        rem -= 1;
    }

    let mut outline = Vec::with_capacity(k);
    let mut start = 1u32;
    for (phase, size) in phases.into_iter().zip(sizes) {
        let end = start + size as u32 - 1;
        outline.push(PhaseSegment {
            start,
            end,
            phase,
            description: String::new(),
        });
        start = end + 1;
    }
    outline
}
