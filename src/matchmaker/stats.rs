//! Wait-time statistics over a match pool
//!
//! Summarises one matchmaking round for logging and metrics: how long the
//! pool has been waiting and how many candidates ended up matched.

use crate::types::{Match, MatchRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of one processed match pool
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchPoolStats {
    pub total_players: usize,
    pub total_matches: usize,
    pub matched_players: usize,
    pub unmatched_players: usize,
    pub avg_wait_seconds: f64,
    pub min_wait_seconds: f64,
    pub max_wait_seconds: f64,
    pub median_wait_seconds: f64,
}

/// Compute wait-time and match statistics for a processed pool
pub fn pool_stats(
    candidates: &[MatchRequest],
    matches: &[Match],
    now: DateTime<Utc>,
) -> MatchPoolStats {
    let mut wait_times: Vec<f64> = candidates
        .iter()
        .map(|request| (now - request.created_at).num_milliseconds() as f64 / 1000.0)
        .collect();
    wait_times.sort_by(|a, b| a.total_cmp(b));

    let matched_players: usize = matches.iter().map(|m| m.player_count()).sum();

    let mut stats = MatchPoolStats {
        total_players: candidates.len(),
        total_matches: matches.len(),
        matched_players,
        unmatched_players: candidates.len().saturating_sub(matched_players),
        ..MatchPoolStats::default()
    };

    if !wait_times.is_empty() {
        stats.min_wait_seconds = wait_times[0];
        stats.max_wait_seconds = wait_times[wait_times.len() - 1];
        stats.avg_wait_seconds = wait_times.iter().sum::<f64>() / wait_times.len() as f64;
        stats.median_wait_seconds = median(&wait_times);
    }

    stats
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
