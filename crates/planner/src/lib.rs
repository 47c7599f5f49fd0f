//! Story planning for Fableforge.
//!
//! - **blueprint**: premise to story blueprint in one model call
//! - **outline**: outline normalization and the fallback arc
//! - **phase_guides**: per-phase requirements and transition guides

pub mod blueprint;
pub mod outline;
pub mod phase_guides;

pub use blueprint::{OutlinePlanner, StoryBlueprint};
pub use outline::{fallback_outline, normalize_outline};
pub use phase_guides::{phase_requirements, transition_guide};
