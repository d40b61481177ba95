//! Durable storage for requests, configs, matches and status projections
//!
//! The matcher and API depend on the [`Storage`] trait only; the concrete
//! Redis implementation is swappable for the in-memory one, which the test
//! suite uses to drive the matcher through the same interface.
//!
//! The per-game queue list is the index of "what is waiting"; the request
//! records are the source of truth for "does it still exist". The two are
//! not atomically linked, so readers skip queue entries whose record has
//! expired and [`Storage::cleanup_stale_queue_entries`] drops them.

pub mod memory;
pub mod redis;

pub use memory::InMemoryStorage;
pub use redis::RedisStorage;

use crate::error::Result;
use crate::types::{
    GameConfig, Match, MatchRequest, MatchStatusView, RequestStatus, StorageStats,
};
use async_trait::async_trait;
use std::time::Duration;

/// How long a match request record lives before it expires
pub const REQUEST_TTL: Duration = Duration::from_secs(60);

/// How long match records and the request-to-match index are retained
pub const MATCH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// How long a cached status projection lives
pub const STATUS_TTL: Duration = Duration::from_secs(60 * 60);

/// Storage operations required by the matchmaking service
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a request under its id and left-push the id onto the
    /// per-game queue. The record carries the request TTL; the queue entry
    /// has none and is garbage-collected by cleanup once the record is gone.
    async fn store_match_request(&self, request: &MatchRequest) -> Result<()>;

    /// Fetch a request by id; not-found is a distinct error
    async fn get_match_request(&self, request_id: &str) -> Result<MatchRequest>;

    /// All requests whose ids the game queue currently contains, in queue
    /// order, skipping ids whose record has expired
    async fn get_game_queue(&self, game_id: &str) -> Result<Vec<MatchRequest>>;

    /// Remove every occurrence of the id from the game queue
    async fn remove_from_queue(&self, game_id: &str, request_id: &str) -> Result<()>;

    /// Read-modify-write of the request record. Does not touch queue
    /// membership; the record TTL restarts at the request TTL from now.
    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()>;

    /// Persist a game config; configs never expire
    async fn store_game_config(&self, config: &GameConfig) -> Result<()>;

    /// Fetch a game config; not-found is a distinct error
    async fn get_game_config(&self, game_id: &str) -> Result<GameConfig>;

    /// Persist a match under the match TTL
    async fn store_match(&self, game_match: &Match) -> Result<()>;

    /// Fetch a match by id; not-found is a distinct error
    async fn get_match(&self, match_id: &str) -> Result<Match>;

    /// Cache the status projection for a request under the status TTL
    async fn store_match_status(&self, request_id: &str, view: &MatchStatusView) -> Result<()>;

    /// Fetch the cached status projection; not-found is a distinct error
    async fn get_match_status(&self, request_id: &str) -> Result<MatchStatusView>;

    /// Record which match a request joined, under the match TTL
    async fn store_request_match(&self, request_id: &str, match_id: &str) -> Result<()>;

    /// Reverse lookup from request id to match id
    async fn get_match_id_for_request(&self, request_id: &str) -> Result<String>;

    /// Drop queue entries whose underlying request record no longer
    /// exists. Returns the number of entries removed.
    async fn cleanup_stale_queue_entries(&self) -> Result<usize>;

    /// Counts of configs, queues and queued ids
    async fn stats(&self) -> Result<StorageStats>;

    /// Liveness probe against the backing store
    async fn ping(&self) -> Result<()>;
}

pub(crate) fn request_key(request_id: &str) -> String {
    format!("match_request:{}", request_id)
}

pub(crate) fn queue_key(game_id: &str) -> String {
    format!("game_queue:{}", game_id)
}

pub(crate) fn config_key(game_id: &str) -> String {
    format!("game_config:{}", game_id)
}

pub(crate) fn match_key(match_id: &str) -> String {
    format!("multi_team_match:{}", match_id)
}

pub(crate) fn status_key(request_id: &str) -> String {
    format!("match_status:{}", request_id)
}

pub(crate) fn request_match_key(request_id: &str) -> String {
    format!("request_match:{}", request_id)
}
