//! Multi-team match formation
//!
//! This module turns a per-game waiting queue into complete multi-team
//! matches, honouring compatibility rules, fairness by wait time and
//! per-round exclusivity.

pub mod pool;
pub mod stats;

pub use pool::{FormedMatch, Matchmaker};
pub use stats::{pool_stats, MatchPoolStats};
