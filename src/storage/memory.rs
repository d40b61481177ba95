//! In-memory storage implementation
//!
//! Implements the [`Storage`](super::Storage) contract with process-local
//! maps. Record expiry is honoured on read, so the TTL skew between queue
//! entries and request records behaves exactly as with the Redis backend.
//! Tests construct it with custom TTLs to exercise expiry deterministically.

use crate::error::{MatchmakingError, Result};
use crate::storage::{Storage, MATCH_TTL, REQUEST_TTL, STATUS_TTL};
use crate::types::{
    GameConfig, Match, MatchRequest, MatchStatusView, RequestStatus, StorageStats,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A stored value with its expiry instant
#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn live(&self) -> Option<&T> {
        if Instant::now() < self.expires_at {
            Some(&self.value)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct StoreInner {
    requests: HashMap<String, Expiring<MatchRequest>>,
    queues: HashMap<String, Vec<String>>,
    configs: HashMap<String, GameConfig>,
    matches: HashMap<String, Expiring<Match>>,
    statuses: HashMap<String, Expiring<MatchStatusView>>,
    request_matches: HashMap<String, Expiring<String>>,
}

/// In-memory storage for tests and single-process deployments
pub struct InMemoryStorage {
    inner: RwLock<StoreInner>,
    request_ttl: Duration,
    match_ttl: Duration,
    status_ttl: Duration,
}

impl InMemoryStorage {
    /// Create a store with the production TTLs
    pub fn new() -> Self {
        Self::with_ttls(REQUEST_TTL, MATCH_TTL, STATUS_TTL)
    }

    /// Create a store with custom TTLs, letting tests force expiry
    pub fn with_ttls(request_ttl: Duration, match_ttl: Duration, status_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            request_ttl,
            match_ttl,
            status_ttl,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreInner>> {
        self.inner.read().map_err(|_| {
            MatchmakingError::StorageFailure {
                message: "storage lock poisoned".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreInner>> {
        self.inner.write().map_err(|_| {
            MatchmakingError::StorageFailure {
                message: "storage lock poisoned".to_string(),
            }
            .into()
        })
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn store_match_request(&self, request: &MatchRequest) -> Result<()> {
        let mut inner = self.write()?;
        inner.requests.insert(
            request.id.clone(),
            Expiring::new(request.clone(), self.request_ttl),
        );
        inner
            .queues
            .entry(request.game_id.clone())
            .or_default()
            .insert(0, request.id.clone());
        Ok(())
    }

    async fn get_match_request(&self, request_id: &str) -> Result<MatchRequest> {
        let inner = self.read()?;
        inner
            .requests
            .get(request_id)
            .and_then(|entry| entry.live())
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::RequestNotFound {
                    request_id: request_id.to_string(),
                }
                .into()
            })
    }

    async fn get_game_queue(&self, game_id: &str) -> Result<Vec<MatchRequest>> {
        let inner = self.read()?;
        let Some(queue) = inner.queues.get(game_id) else {
            return Ok(Vec::new());
        };

        Ok(queue
            .iter()
            .filter_map(|request_id| {
                inner
                    .requests
                    .get(request_id)
                    .and_then(|entry| entry.live())
                    .cloned()
            })
            .collect())
    }

    async fn remove_from_queue(&self, game_id: &str, request_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(queue) = inner.queues.get_mut(game_id) {
            queue.retain(|id| id != request_id);
        }
        Ok(())
    }

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        let mut request = self.get_match_request(request_id).await?;
        request.status = status;

        let mut inner = self.write()?;
        inner.requests.insert(
            request_id.to_string(),
            Expiring::new(request, self.request_ttl),
        );
        Ok(())
    }

    async fn store_game_config(&self, config: &GameConfig) -> Result<()> {
        let mut config = config.clone();
        config.updated_at = current_timestamp();

        let mut inner = self.write()?;
        inner.configs.insert(config.game_id.clone(), config);
        Ok(())
    }

    async fn get_game_config(&self, game_id: &str) -> Result<GameConfig> {
        let inner = self.read()?;
        inner.configs.get(game_id).cloned().ok_or_else(|| {
            MatchmakingError::ConfigNotFound {
                game_id: game_id.to_string(),
            }
            .into()
        })
    }

    async fn store_match(&self, game_match: &Match) -> Result<()> {
        let mut inner = self.write()?;
        inner.matches.insert(
            game_match.id.clone(),
            Expiring::new(game_match.clone(), self.match_ttl),
        );
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<Match> {
        let inner = self.read()?;
        inner
            .matches
            .get(match_id)
            .and_then(|entry| entry.live())
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::MatchNotFound {
                    match_id: match_id.to_string(),
                }
                .into()
            })
    }

    async fn store_match_status(&self, request_id: &str, view: &MatchStatusView) -> Result<()> {
        let mut inner = self.write()?;
        inner.statuses.insert(
            request_id.to_string(),
            Expiring::new(view.clone(), self.status_ttl),
        );
        Ok(())
    }

    async fn get_match_status(&self, request_id: &str) -> Result<MatchStatusView> {
        let inner = self.read()?;
        inner
            .statuses
            .get(request_id)
            .and_then(|entry| entry.live())
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::StatusNotFound {
                    request_id: request_id.to_string(),
                }
                .into()
            })
    }

    async fn store_request_match(&self, request_id: &str, match_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.request_matches.insert(
            request_id.to_string(),
            Expiring::new(match_id.to_string(), self.match_ttl),
        );
        Ok(())
    }

    async fn get_match_id_for_request(&self, request_id: &str) -> Result<String> {
        let inner = self.read()?;
        inner
            .request_matches
            .get(request_id)
            .and_then(|entry| entry.live())
            .cloned()
            .ok_or_else(|| {
                MatchmakingError::MatchNotFound {
                    match_id: format!("for request {}", request_id),
                }
                .into()
            })
    }

    async fn cleanup_stale_queue_entries(&self) -> Result<usize> {
        let mut inner = self.write()?;

        let live_ids: std::collections::HashSet<String> = inner
            .requests
            .iter()
            .filter(|(_, entry)| entry.live().is_some())
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = 0usize;
        for queue in inner.queues.values_mut() {
            let before = queue.len();
            queue.retain(|id| live_ids.contains(id));
            removed += before - queue.len();
        }

        // Drop the expired records themselves as well, mirroring TTL expiry
        inner.requests.retain(|_, entry| entry.live().is_some());

        Ok(removed)
    }

    async fn stats(&self) -> Result<StorageStats> {
        let inner = self.read()?;
        Ok(StorageStats {
            total_game_configs: inner.configs.len(),
            total_game_queues: inner.queues.len(),
            total_pending_requests: inner.queues.values().map(|queue| queue.len()).sum(),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
