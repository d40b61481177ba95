//! MM-Rules - rules-driven multi-team matchmaking service
//!
//! This crate accepts player join requests tagged with arbitrary metadata,
//! groups them into multi-team matches that satisfy per-game compatibility
//! rules (with time-based relaxation), and hands formed matches to an
//! external session allocator.

pub mod allocation;
pub mod api;
pub mod config;
pub mod error;
pub mod matchmaker;
pub mod metrics;
pub mod rules;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matchmaker::Matchmaker;
pub use rules::RuleEngine;
pub use storage::Storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
