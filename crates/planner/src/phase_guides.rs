//! Per-phase narrative requirements and phase-transition guides.
//!
//! Static prompt fragments keyed by phase. The requirement text shapes
//! every episode in a phase; the transition guide is added only to the
//! final episode of a segment.

use fableforge_core::story::Phase;

/// What the prose of an episode in this phase must accomplish.
pub fn phase_requirements(phase: Phase) -> &'static str {
    match phase {
        Phase::Exposition => {
            "- Set the scene with vivid sensory details and atmosphere.\n\
             - Introduce the protagonist through actions and thoughts, showing their normal world.\n\
             - Highlight strengths, flaws, and routines through interactions.\n\
             - Subtly hint at tensions or themes to come."
        }
        Phase::IncitingIncident => {
            "- Disrupt the status quo with a mysterious, tense, or unexpected event.\n\
             - Hook with a moment demanding the protagonist's response.\n\
             - Plant seeds of the central conflict without a full reveal.\n\
             - Raise stakes to push the story forward."
        }
        Phase::RisingAction => {
            "- Escalate obstacles testing the protagonist's values and skills.\n\
             - Deepen character bonds or conflicts through shared challenges.\n\
             - Reveal backstory and complications forcing tough choices.\n\
             - Build tension with pacing and a mini-cliffhanger raising stakes."
        }
        Phase::Dilemma => {
            "- Present a layered obstacle with no easy solution.\n\
             - Force a pivotal choice revealing the protagonist's core beliefs.\n\
             - Heighten stakes with conflicting goals and mutual reliance.\n\
             - End with urgency pushing toward a critical decision."
        }
        Phase::Climax => {
            "- Peak tension as conflicts collide in a decisive confrontation.\n\
             - Force the protagonist to face the central challenge or antagonist.\n\
             - Reveal a final twist or surprise recontextualizing the struggle.\n\
             - Show growth through bold choices and sacrifices."
        }
        Phase::Denouement => {
            "- Resolve conflicts with emotional and narrative closure.\n\
             - Show consequences of the climax for characters and world.\n\
             - Reflect growth and themes through dialogue, imagery, or realization.\n\
             - Establish a new status quo, leaving a memorable final impression."
        }
    }
}

/// How the closing episode of `from` should hand off to `to`.
///
/// Known adjacent pairs get a tailored guide; any other pair falls back to
/// a generic bridge so a repaired outline still gets usable guidance.
pub fn transition_guide(from: Phase, to: Phase) -> String {
    let tailored = match (from, to) {
        (Phase::Exposition, Phase::IncitingIncident) => Some(
            "- Bridge the normal world to the inciting event with subtle foreshadowing.\n\
             - Show the protagonist's routine and worldview just before disruption.\n\
             - Create contrast between the before and after states.\n\
             - Use sensory details that hint at the coming change.",
        ),
        (Phase::IncitingIncident, Phase::RisingAction) => Some(
            "- Show the protagonist's immediate emotional reaction to the inciting event.\n\
             - Illustrate their decision to engage with the new situation.\n\
             - Introduce secondary characters who will aid or hinder progress.\n\
             - Begin complicating the initial problem with new obstacles.",
        ),
        (Phase::RisingAction, Phase::Dilemma) => Some(
            "- Escalate stakes to force a critical decision point.\n\
             - Create a situation where the protagonist's old methods fail.\n\
             - Bring conflicting values or goals into direct opposition.\n\
             - Reveal new information that changes the protagonist's understanding.",
        ),
        (Phase::Dilemma, Phase::Climax) => Some(
            "- Show the resolution of the dilemma through a meaningful choice.\n\
             - Accelerate pacing with shorter sentences and immediate action.\n\
             - Bring key characters into direct confrontation.\n\
             - Create a point-of-no-return moment that commits to resolution.",
        ),
        (Phase::Climax, Phase::Denouement) => Some(
            "- Show the immediate aftermath and emotional impact of the climax.\n\
             - Begin resolving secondary conflicts and character arcs.\n\
             - Reflect on how the protagonist has changed from beginning to end.\n\
             - Create symmetry with the opening through mirrored imagery or situations.",
        ),
        _ => None,
    };

    match tailored {
        Some(text) => text.to_string(),
        None => format!(
            "- Close out the {} phase and set up the shift into the {} phase.\n\
             - Carry forward the protagonist's current emotional state.\n\
             - End on a beat that makes the change of direction feel earned.",
            from.label(),
            to.label()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_phase_has_requirements() {
        for phase in Phase::ALL {
            assert!(!phase_requirements(phase).is_empty());
        }
    }

    #[test]
    fn adjacent_pairs_have_tailored_guides() {
        let guide = transition_guide(Phase::Dilemma, Phase::Climax);
        assert!(guide.contains("point-of-no-return"));
    }

    #[test]
    fn skipped_phase_pairs_fall_back_gracefully() {
        // Collapsed short-story outlines jump straight from exposition.
        let guide = transition_guide(Phase::Exposition, Phase::Climax);
        assert!(guide.contains("exposition"));
        assert!(guide.contains("climax"));
    }
}
