//! # fableforge-engine
//!
//! Orchestration for episodic story generation:
//!
//! - **context**: per-episode context assembly
//! - **generator**: two-stage episode generation
//! - **refine**: batch validation and refinement strategies
//! - **mutator**: commit-time state folding
//! - **quota**: fixed-window generation quotas
//! - **pipeline**: the end-to-end story pipeline

pub mod context;
pub mod generator;
pub mod mutator;
pub mod pipeline;
mod prompts;
pub mod quota;
pub mod refine;

pub use context::{ContextAssembler, EpisodeBrief, EpisodeContext};
pub use generator::EpisodeGenerator;
pub use pipeline::{BatchReport, PipelineConfig, StoryPipeline};
pub use quota::FixedWindowQuota;
pub use refine::{
    AutomaticStrategy, BatchState, BatchWarning, ChangeKind, FeedbackInterpreter, HumanStrategy,
    RefinementStrategy, Reviewed,
};
