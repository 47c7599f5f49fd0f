//! Batch refinement.
//!
//! A generated batch passes through a review step before it can commit.
//! The [`RefinementStrategy`] trait is the seam: the automatic strategy
//! validates with model judgments and regenerates flagged episodes in
//! place; the human strategy parks the batch and waits for explicit
//! feedback and validation.

use async_trait::async_trait;
use fableforge_core::error::Result;
use fableforge_core::{Character, Episode, Story};

mod automatic;
mod human;

pub use automatic::AutomaticStrategy;
pub use human::{ChangeKind, FeedbackInterpreter, HumanStrategy};

/// Where a batch sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Generated and parked, awaiting human review.
    Generated,
    /// Under model validation.
    Validating,
    /// At least one episode flagged for rework.
    NeedsRefinement,
    /// Committed to the store.
    Committed,
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BatchState::Generated => "generated",
            BatchState::Validating => "validating",
            BatchState::NeedsRefinement => "needs_refinement",
            BatchState::Committed => "committed",
        })
    }
}

/// Non-fatal outcomes surfaced on a batch report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchWarning {
    /// Validation still flagged episodes when the retry budget ran out;
    /// the batch committed as-is.
    RetryBudgetExhausted { attempts: u32, episodes: Vec<u32> },
}

/// The outcome of reviewing a batch.
pub struct Reviewed {
    /// The batch, with any flagged episodes regenerated in place.
    pub episodes: Vec<Episode>,
    pub warnings: Vec<BatchWarning>,
    /// Commit now, or park for human validation.
    pub approve: bool,
}

/// How a generated batch gets reviewed before commit.
#[async_trait]
pub trait RefinementStrategy: Send + Sync {
    /// Review a batch. `previous` is the committed episode immediately
    /// before the batch, when one exists.
    async fn review(
        &self,
        story: &Story,
        previous: Option<&Episode>,
        characters: &[Character],
        batch: Vec<Episode>,
    ) -> Result<Reviewed>;
}
