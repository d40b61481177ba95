//! Error types for the matchmaking service
//!
//! Failures fall into a few families: not-found lookups (requests, game
//! configs, matches, cached status views), client input that fails
//! validation, storage and allocation failures, and bad service
//! configuration. Domain failures are [`MatchmakingError`] variants carried
//! behind [`anyhow::Error`]; the API layer downcasts to map the not-found
//! family to 404 and bad input to 400, treating everything else as a
//! server-side failure.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("match request not found: {request_id}")]
    RequestNotFound { request_id: String },

    #[error("game config not found: {game_id}")]
    ConfigNotFound { game_id: String },

    #[error("match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("match status not found: {request_id}")]
    StatusNotFound { request_id: String },

    #[error("invalid game config: {reason}")]
    InvalidGameConfig { reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("storage failure: {message}")]
    StorageFailure { message: String },

    #[error("session allocation failed: {reason}")]
    AllocationFailed { reason: String },

    #[error("configuration error: {message}")]
    ConfigurationError { message: String },
}

impl MatchmakingError {
    /// True for the not-found family of errors, which the API maps to 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MatchmakingError::RequestNotFound { .. }
                | MatchmakingError::ConfigNotFound { .. }
                | MatchmakingError::MatchNotFound { .. }
                | MatchmakingError::StatusNotFound { .. }
        )
    }

    /// True for client-input errors, which the API maps to 400.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            MatchmakingError::InvalidGameConfig { .. } | MatchmakingError::InvalidRequest { .. }
        )
    }
}
