//! Generation quota trait.
//!
//! Checked before any model call in batch generation; a failed check must
//! result in zero provider calls.

use async_trait::async_trait;

use crate::error::QuotaError;
use crate::story::OwnerId;

/// Gate over per-owner episode generation quotas (fixed daily and monthly
/// windows).
#[async_trait]
pub trait GenerationGate: Send + Sync {
    /// Reserve `episodes` generations for the owner, or fail with the
    /// exhausted window. Reservation and count update are one step so two
    /// concurrent batches cannot both pass on the last slot.
    async fn reserve(
        &self,
        owner: &OwnerId,
        episodes: u32,
    ) -> std::result::Result<(), QuotaError>;
}

/// A gate that always admits. Used where quotas are not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedGate;

#[async_trait]
impl GenerationGate for UnlimitedGate {
    async fn reserve(
        &self,
        _owner: &OwnerId,
        _episodes: u32,
    ) -> std::result::Result<(), QuotaError> {
        Ok(())
    }
}
