//! Error types for the Fableforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Fableforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Quota errors ---
    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    // --- Extraction errors ---
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    // --- Planner errors ---
    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response from provider: {0}")]
    EmptyResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// An absent record and an owner mismatch are deliberately
    /// indistinguishable to the caller.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Error)]
pub enum QuotaError {
    #[error("Daily episode limit reached ({limit}), resets at {resets_at}")]
    DailyLimit { limit: u32, resets_at: String },

    #[error("Monthly episode limit reached ({limit}), resets at {resets_at}")]
    MonthlyLimit { limit: u32, resets_at: String },
}

#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// Raised only when even the caller-supplied placeholder fails to
    /// parse. Every recoverable malformation is repaired earlier in the
    /// extraction pipeline.
    #[error("Irrecoverable model output: {0}")]
    Irrecoverable(String),
}

#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    #[error("Blueprint missing required field: {0}")]
    MissingField(String),

    #[error("Invalid episode count: {0}")]
    InvalidEpisodeCount(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn quota_error_displays_limit_and_reset() {
        let err = Error::Quota(QuotaError::DailyLimit {
            limit: 10,
            resets_at: "2026-08-24T00:00:00Z".into(),
        });
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("2026-08-24"));
    }

    #[test]
    fn store_not_found_does_not_leak_owner_detail() {
        let err = StoreError::NotFound("story 42".into());
        assert_eq!(err.to_string(), "Not found: story 42");
    }
}
