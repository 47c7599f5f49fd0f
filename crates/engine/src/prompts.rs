//! Prompt templates.
//!
//! Every model call in the engine renders its prompt here, so the wording
//! lives in one place. Templates ask for bare JSON where structure is
//! needed; the layered extractor copes when the model decorates it anyway.

use std::fmt::Write;

use fableforge_core::Episode;

use crate::context::EpisodeContext;

const HINGLISH_NOTE: &str =
    "Write the prose in natural Hinglish (Hindi in Latin script mixed with English).";

/// Stage 1: title and prose.
pub(crate) fn stage_one(ctx: &EpisodeContext) -> String {
    let mut p = String::new();
    let _ = writeln!(
        p,
        "You are the narrator of \"{}\", a serialized {} story.",
        ctx.story_title, ctx.genre
    );
    if !ctx.theme.is_empty() {
        let _ = writeln!(p, "Theme: {}", ctx.theme);
    }
    if !ctx.special_instructions.is_empty() {
        let _ = writeln!(p, "Style notes: {}", ctx.special_instructions);
    }
    if ctx.hinglish {
        let _ = writeln!(p, "{HINGLISH_NOTE}");
    }

    if !ctx.settings.is_empty() {
        let _ = writeln!(p, "\nKNOWN PLACES:");
        for (name, description) in &ctx.settings {
            let _ = writeln!(p, "- {name}: {description}");
        }
    }

    if !ctx.active_characters.is_empty() {
        let _ = writeln!(p, "\nCHARACTERS PRESENT:");
        for c in &ctx.active_characters {
            let _ = writeln!(
                p,
                "- {} ({}): {} Currently {}.",
                c.name, c.role, c.description, c.emotional_state
            );
            for m in &c.milestones {
                let _ = writeln!(p, "  milestone (ep {}): {}", m.episode, m.event);
            }
        }
    }
    if !ctx.absent_characters.is_empty() {
        let _ = writeln!(
            p,
            "\nABSENT (do not feature): {}",
            ctx.absent_characters.join(", ")
        );
    }

    if !ctx.key_events.is_empty() {
        let _ = writeln!(p, "\nESTABLISHED EVENTS (stay consistent with these):");
        for event in &ctx.key_events {
            let _ = writeln!(p, "- {event}");
        }
    }

    if !ctx.retrieved.is_empty() {
        let _ = writeln!(p, "\nRELEVANT EARLIER SCENES:");
        for chunk in &ctx.retrieved {
            let _ = writeln!(p, "[Ep {}] {}", chunk.episode_number, chunk.content);
        }
    }

    if !ctx.recap.is_empty() {
        let _ = writeln!(p, "\nPREVIOUSLY:");
        for brief in &ctx.recap {
            let _ = writeln!(p, "Episode {} \"{}\": {}", brief.number, brief.title, brief.summary);
        }
    }
    for (number, content) in &ctx.recent_content {
        let _ = writeln!(p, "\nFULL TEXT OF EPISODE {number}:\n{content}");
    }

    let _ = writeln!(
        p,
        "\nNow write episode {} of {}. Narrative phase: {}.",
        ctx.number,
        if ctx.is_final { "the story (the FINAL episode)".to_string() } else { "the story".to_string() },
        ctx.phase.label()
    );
    if !ctx.segment_description.is_empty() {
        let _ = writeln!(p, "This stretch of the story covers: {}", ctx.segment_description);
    }
    let _ = writeln!(p, "\nPHASE REQUIREMENTS:\n{}", ctx.phase_requirements);
    if let Some(transition) = &ctx.transition {
        let _ = writeln!(
            p,
            "\nThis episode closes its phase. TRANSITION REQUIREMENTS:\n{transition}"
        );
    }

    let _ = write!(
        p,
        "\nRespond with ONLY a JSON object:\n\
         {{ \"title\": \"episode title\", \"content\": \"the full episode prose\" }}"
    );
    p
}

/// Stage 2: structured metadata for a drafted episode.
pub(crate) fn stage_two(ctx: &EpisodeContext, title: &str, content: &str) -> String {
    let roster: Vec<&str> = ctx
        .active_characters
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    format!(
        r#"Analyze this episode of "{story}" and extract its metadata.

EPISODE {number}: {title}
{content}

Known characters: {roster}

Respond with ONLY a JSON object:
{{
  "summary": "2-3 sentence summary of the episode",
  "emotional_state": "the dominant mood at episode end",
  "characters_featured": [{{ "name": "...", "role": "...", "description": "...", "emotional_state": "...", "relationships": {{ "other name": "relationship" }}, "milestone": "a lasting personal change this episode, or null" }}],
  "key_events": [{{ "event": "one sentence", "tier": "foundational|character_defining|transitional|contextual" }}],
  "settings_updates": {{ "place name": "one-line description" }}
}}"#,
        story = ctx.story_title,
        number = ctx.number,
        roster = roster.join(", "),
    )
}

/// Consistency check: TRUE/FALSE continuity judgment against the
/// predecessor episode.
pub(crate) fn consistency_check(previous: &Episode, current: &Episode) -> String {
    format!(
        "PREVIOUS EPISODE ({}) SUMMARY:\n{}\n\nCURRENT EPISODE ({}):\n{}\n\n\
         Does the current episode follow consistently from the previous one \
         (continuity of facts, characters, and tone)? Respond with exactly \
         TRUE or FALSE.",
        previous.number, previous.summary, current.number, current.content
    )
}

/// Standalone quality check: GOOD, or feedback for regeneration.
pub(crate) fn quality_check(story_title: &str, episode: &Episode) -> String {
    format!(
        "You are a strict story editor reviewing an episode of \"{}\".\n\n\
         EPISODE {}: {}\n{}\n\n\
         If the episode is publishable as-is, respond with exactly GOOD. \
         Otherwise respond with concise, actionable feedback on what to fix.",
        story_title, episode.number, episode.title, episode.content
    )
}

/// Targeted regeneration of one flagged episode.
pub(crate) fn regenerate(
    story_title: &str,
    episode: &Episode,
    feedback: &str,
    previous_summary: Option<&str>,
    is_final: bool,
    closes_batch: bool,
) -> String {
    let mut p = format!(
        "Rewrite episode {} of \"{}\" to address the editor's feedback.\n\n\
         FEEDBACK:\n{}\n\n",
        episode.number, story_title, feedback
    );
    if let Some(summary) = previous_summary {
        let _ = writeln!(p, "PREVIOUS EPISODE SUMMARY:\n{summary}\n");
    }
    if is_final {
        let _ = writeln!(p, "This is the FINAL episode; it must land the ending.\n");
    } else if closes_batch {
        let _ = writeln!(p, "This episode closes the current installment; end on a hook.\n");
    }
    let _ = write!(
        p,
        "ORIGINAL EPISODE \"{}\":\n{}\n\n\
         Keep what works; fix what the feedback names. Respond with ONLY a \
         JSON object:\n{{ \"title\": \"episode title\", \"content\": \"the full episode prose\" }}",
        episode.title, episode.content
    );
    p
}

/// Classify a human feedback instruction into an edit operation.
pub(crate) fn interpret_feedback(instruction: &str, episode: &Episode) -> String {
    format!(
        r#"A reader left an instruction about episode {number} "{title}". Classify it.

INSTRUCTION:
{instruction}

Kinds:
- "replace_title": the reader supplies the exact new title (put it in "title")
- "ai_title": the reader wants a better title but does not supply one
- "replace_line": the reader supplies an exact line to replace and its replacement (put them in "old_line" and "new_line")
- "improve_line": the reader names a line to improve in some style (put the line in "line" and the style in "style")
- "style_enhance": the reader wants the whole episode rewritten in a style (put it in "style")
- "content_edit": any other content change

Respond with ONLY a JSON object:
{{ "kind": "...", "title": "", "old_line": "", "new_line": "", "line": "", "style": "" }}"#,
        number = episode.number,
        title = episode.title,
        instruction = instruction,
    )
}

/// Propose a title for existing prose.
pub(crate) fn propose_title(content: &str) -> String {
    format!(
        "Propose a short, evocative title for this episode. Respond with the \
         title only, no quotes.\n\n{content}"
    )
}

/// Rewrite one line in a requested style.
pub(crate) fn improve_line(line: &str, style: &str) -> String {
    format!(
        "Rewrite this line{}. Respond with the rewritten line only.\n\n{line}",
        if style.is_empty() { String::new() } else { format!(" to be {style}") }
    )
}

/// Rewrite a whole episode per an instruction or style.
pub(crate) fn rewrite_content(content: &str, instruction: &str) -> String {
    format!(
        "Rewrite this episode according to the instruction. Keep the plot \
         beats intact. Respond with the rewritten prose only.\n\n\
         INSTRUCTION: {instruction}\n\nEPISODE:\n{content}"
    )
}

/// A spoiler-free story teaser from committed episode summaries.
pub(crate) fn teaser(title: &str, summaries: &[String]) -> String {
    format!(
        "Write a 2-3 sentence spoiler-free teaser for the story \"{}\" from \
         these episode summaries. Respond with the teaser only.\n\n{}",
        title,
        summaries.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EpisodeBrief;
    use fableforge_core::story::Phase;

    fn ctx() -> EpisodeContext {
        EpisodeContext {
            number: 4,
            phase: Phase::RisingAction,
            segment_description: "the voyage".into(),
            phase_requirements: "- Escalate obstacles.",
            transition: Some("- Hand off to the dilemma.".into()),
            is_final: false,
            story_title: "The Salt Road".into(),
            genre: "adventure".into(),
            theme: "loyalty".into(),
            special_instructions: String::new(),
            hinglish: false,
            settings: vec![("Karem Port".into(), "a smuggler's harbor".into())],
            recap: vec![EpisodeBrief {
                number: 3,
                title: "Cast Off".into(),
                summary: "They leave the harbor.".into(),
            }],
            recent_content: vec![(3, "The ropes came free at dawn.".into())],
            active_characters: vec![],
            absent_characters: vec!["Old Ben".into()],
            key_events: vec!["Ep 2: Mira found a key".into()],
            retrieved: vec![],
        }
    }

    #[test]
    fn stage_one_carries_every_section() {
        let p = stage_one(&ctx());
        assert!(p.contains("The Salt Road"));
        assert!(p.contains("Karem Port"));
        assert!(p.contains("ABSENT"));
        assert!(p.contains("Mira found a key"));
        assert!(p.contains("PREVIOUSLY:"));
        assert!(p.contains("FULL TEXT OF EPISODE 3"));
        assert!(p.contains("rising action"));
        assert!(p.contains("TRANSITION REQUIREMENTS"));
        assert!(p.contains("\"title\""));
    }

    #[test]
    fn final_episode_is_called_out() {
        let mut c = ctx();
        c.is_final = true;
        c.transition = None;
        assert!(stage_one(&c).contains("FINAL episode"));
    }

    #[test]
    fn stage_two_names_the_tier_vocabulary() {
        let p = stage_two(&ctx(), "Storm Glass", "The sea turned.");
        assert!(p.contains("Storm Glass"));
        assert!(p.contains("character_defining"));
        assert!(p.contains("settings_updates"));
    }
}
