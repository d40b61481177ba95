//! Rule evaluation for the matchmaking service
//!
//! This module evaluates player metadata against per-game rule lists,
//! including strictness, priority ordering and time-based relaxation.

pub mod engine;

pub use engine::RuleEngine;
