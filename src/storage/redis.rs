//! Redis-backed storage implementation
//!
//! Persists every record as JSON under namespaced keys and keeps the
//! per-game queue as a Redis list. TTLs follow the contract in the
//! [`Storage`](super::Storage) trait.

use crate::error::{MatchmakingError, Result};
use crate::storage::{
    config_key, match_key, queue_key, request_key, request_match_key, status_key, Storage,
    MATCH_TTL, REQUEST_TTL, STATUS_TTL,
};
use crate::types::{
    GameConfig, Match, MatchRequest, MatchStatusView, RequestStatus, StorageStats,
};
use crate::utils::current_timestamp;
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

/// Redis storage for the matchmaking service
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
}

impl RedisStorage {
    /// Connect to Redis and build the shared connection manager
    pub async fn connect(addr: &str, password: &str, db: i64) -> Result<Self> {
        let url = if password.is_empty() {
            format!("redis://{}/{}", addr, db)
        } else {
            format!("redis://:{}@{}/{}", password, addr, db)
        };

        let client = redis::Client::open(url).context("invalid redis address")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to redis")?;

        Ok(Self { conn })
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection();
        let data: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("failed to read key {}", key))?;

        match data {
            Some(data) => {
                let value = serde_json::from_str(&data)
                    .with_context(|| format!("failed to decode record at {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let data = serde_json::to_string(value).context("failed to encode record")?;
        let mut conn = self.connection();

        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key, data, ttl.as_secs())
                    .await
                    .with_context(|| format!("failed to write key {}", key))?;
            }
            None => {
                let _: () = conn
                    .set(key, data)
                    .await
                    .with_context(|| format!("failed to write key {}", key))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn store_match_request(&self, request: &MatchRequest) -> Result<()> {
        self.set_json(&request_key(&request.id), request, Some(REQUEST_TTL))
            .await?;

        let mut conn = self.connection();
        let _: () = conn
            .lpush(queue_key(&request.game_id), &request.id)
            .await
            .context("failed to add request to game queue")?;

        Ok(())
    }

    async fn get_match_request(&self, request_id: &str) -> Result<MatchRequest> {
        self.get_json(&request_key(request_id))
            .await?
            .ok_or_else(|| {
                MatchmakingError::RequestNotFound {
                    request_id: request_id.to_string(),
                }
                .into()
            })
    }

    async fn get_game_queue(&self, game_id: &str) -> Result<Vec<MatchRequest>> {
        let mut conn = self.connection();
        let request_ids: Vec<String> = conn
            .lrange(queue_key(game_id), 0, -1)
            .await
            .context("failed to read game queue")?;

        let mut requests = Vec::with_capacity(request_ids.len());
        for request_id in request_ids {
            // Expired records leave dangling queue entries; skip them here,
            // cleanup drops them later.
            match self.get_json::<MatchRequest>(&request_key(&request_id)).await {
                Ok(Some(request)) => requests.push(request),
                Ok(None) => debug!(request_id = %request_id, "skipping expired queue entry"),
                Err(e) => warn!(request_id = %request_id, error = %e, "skipping unreadable queue entry"),
            }
        }

        Ok(requests)
    }

    async fn remove_from_queue(&self, game_id: &str, request_id: &str) -> Result<()> {
        let mut conn = self.connection();
        let _: () = conn
            .lrem(queue_key(game_id), 0, request_id)
            .await
            .context("failed to remove request from game queue")?;
        Ok(())
    }

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        let mut request = self.get_match_request(request_id).await?;
        request.status = status;
        self.set_json(&request_key(request_id), &request, Some(REQUEST_TTL))
            .await
    }

    async fn store_game_config(&self, config: &GameConfig) -> Result<()> {
        let mut config = config.clone();
        config.updated_at = current_timestamp();
        self.set_json(&config_key(&config.game_id), &config, None)
            .await
    }

    async fn get_game_config(&self, game_id: &str) -> Result<GameConfig> {
        self.get_json(&config_key(game_id)).await?.ok_or_else(|| {
            MatchmakingError::ConfigNotFound {
                game_id: game_id.to_string(),
            }
            .into()
        })
    }

    async fn store_match(&self, game_match: &Match) -> Result<()> {
        self.set_json(&match_key(&game_match.id), game_match, Some(MATCH_TTL))
            .await
    }

    async fn get_match(&self, match_id: &str) -> Result<Match> {
        self.get_json(&match_key(match_id)).await?.ok_or_else(|| {
            MatchmakingError::MatchNotFound {
                match_id: match_id.to_string(),
            }
            .into()
        })
    }

    async fn store_match_status(&self, request_id: &str, view: &MatchStatusView) -> Result<()> {
        self.set_json(&status_key(request_id), view, Some(STATUS_TTL))
            .await
    }

    async fn get_match_status(&self, request_id: &str) -> Result<MatchStatusView> {
        self.get_json(&status_key(request_id)).await?.ok_or_else(|| {
            MatchmakingError::StatusNotFound {
                request_id: request_id.to_string(),
            }
            .into()
        })
    }

    async fn store_request_match(&self, request_id: &str, match_id: &str) -> Result<()> {
        let mut conn = self.connection();
        let _: () = conn
            .set_ex(request_match_key(request_id), match_id, MATCH_TTL.as_secs())
            .await
            .context("failed to write request-match index")?;
        Ok(())
    }

    async fn get_match_id_for_request(&self, request_id: &str) -> Result<String> {
        let mut conn = self.connection();
        let match_id: Option<String> = conn
            .get(request_match_key(request_id))
            .await
            .context("failed to read request-match index")?;

        match_id.ok_or_else(|| {
            MatchmakingError::MatchNotFound {
                match_id: format!("for request {}", request_id),
            }
            .into()
        })
    }

    async fn cleanup_stale_queue_entries(&self) -> Result<usize> {
        let mut conn = self.connection();
        let queue_keys: Vec<String> = conn
            .keys("game_queue:*")
            .await
            .context("failed to list game queues")?;

        let mut removed = 0usize;
        for queue in queue_keys {
            let request_ids: Vec<String> = match conn.lrange(&queue, 0, -1).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(queue = %queue, error = %e, "failed to read queue during cleanup");
                    continue;
                }
            };

            for request_id in request_ids {
                let exists: bool = conn
                    .exists(request_key(&request_id))
                    .await
                    .context("failed to probe request record")?;
                if !exists {
                    let _: () = conn
                        .lrem(&queue, 0, &request_id)
                        .await
                        .context("failed to drop stale queue entry")?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }

    async fn stats(&self) -> Result<StorageStats> {
        let mut conn = self.connection();

        let config_keys: Vec<String> = conn
            .keys("game_config:*")
            .await
            .context("failed to count game configs")?;
        let queue_keys: Vec<String> = conn
            .keys("game_queue:*")
            .await
            .context("failed to count game queues")?;

        let mut total_pending = 0usize;
        for queue in &queue_keys {
            let len: usize = conn
                .llen(queue)
                .await
                .context("failed to read queue length")?;
            total_pending += len;
        }

        Ok(StorageStats {
            total_game_configs: config_keys.len(),
            total_game_queues: queue_keys.len(),
            total_pending_requests: total_pending,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis ping failed")?;
        Ok(())
    }
}
