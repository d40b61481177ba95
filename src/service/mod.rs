//! Service layer for the matchmaking service
//!
//! This module contains the matchmaking orchestration used by the API
//! handlers, the production application state and the background cleanup
//! task.

pub mod app;
pub mod matchmaking;

pub use app::AppState;
pub use matchmaking::{AllocationOutcome, MatchmakingService};
