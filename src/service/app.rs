//! Application state and background task coordination
//!
//! Wires the storage backend, allocator, metrics and matchmaking service
//! together for the production binary, and owns the periodic queue cleanup
//! task.

use crate::allocation::{Allocator, HttpAllocator};
use crate::config::AppConfig;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::service::matchmaking::MatchmakingService;
use crate::storage::{RedisStorage, Storage};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    matchmaking: Arc<MatchmakingService>,
    metrics: Arc<MetricsCollector>,
    background_tasks: Vec<JoinHandle<()>>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application against the configured Redis backend
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!(
            redis_addr = %config.redis.addr,
            webhook_url = %config.allocation.webhook_url,
            "initializing matchmaking service"
        );

        let storage = RedisStorage::connect(
            &config.redis.addr,
            &config.redis.password,
            config.redis.db,
        )
        .await?;
        storage.ping().await.context("redis is unreachable")?;
        info!("connected to redis");

        let allocator = Arc::new(HttpAllocator::new(config.allocation.webhook_url.clone())?);

        Self::with_components(config, Arc::new(storage), allocator)
    }

    /// Build the application over explicit storage and allocator
    /// implementations; tests use this with the in-memory backends.
    pub fn with_components(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        allocator: Arc<dyn Allocator>,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        let matchmaking = Arc::new(
            MatchmakingService::new(storage, allocator, metrics.clone())
                .with_allocation_retries(
                    config.allocation.max_retries,
                    config.allocation_retry_delay(),
                ),
        );

        Ok(Self {
            config,
            matchmaking,
            metrics,
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start background tasks
    pub async fn start(&mut self) -> Result<()> {
        *self.is_running.write().await = true;
        self.start_cleanup_task();
        info!("matchmaking service started");
        Ok(())
    }

    /// Stop background tasks
    pub async fn shutdown(&mut self) {
        *self.is_running.write().await = false;

        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        info!("matchmaking service stopped");
    }

    /// Spawn the periodic queue cleanup task.
    ///
    /// Each tick drops queue entries whose request record has expired,
    /// keeping queue length metrics honest and queues bounded.
    fn start_cleanup_task(&mut self) {
        let storage = self.matchmaking.storage();
        let cleanup_interval = self.config.cleanup_interval();
        let is_running = self.is_running.clone();

        info!(
            interval_seconds = cleanup_interval.as_secs(),
            "starting queue cleanup task"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);

            while *is_running.read().await {
                ticker.tick().await;

                match storage.cleanup_stale_queue_entries().await {
                    Ok(0) => debug!("cleanup pass found no stale queue entries"),
                    Ok(removed) => info!(removed, "dropped stale queue entries"),
                    Err(e) => warn!(error = %e, "queue cleanup failed"),
                }
            }

            info!("queue cleanup task stopped");
        });

        self.background_tasks.push(handle);
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if the service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the matchmaking service
    pub fn matchmaking(&self) -> Arc<MatchmakingService> {
        self.matchmaking.clone()
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::MockAllocator;
    use crate::storage::InMemoryStorage;
    use crate::types::MatchRequest;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cleanup_task_drops_stale_entries() {
        let mut config = AppConfig::default();
        config.matchmaking.cleanup_interval_seconds = 1;

        // zero request TTL: records expire immediately, queue entries linger
        let storage = Arc::new(InMemoryStorage::with_ttls(
            Duration::ZERO,
            crate::storage::MATCH_TTL,
            crate::storage::STATUS_TTL,
        ));
        let request = MatchRequest::new(
            "p1".to_string(),
            "game".to_string(),
            crate::types::Metadata::new(),
        );
        storage.store_match_request(&request).await.unwrap();
        assert_eq!(storage.stats().await.unwrap().total_pending_requests, 1);

        let mut app =
            AppState::with_components(config, storage.clone(), Arc::new(MockAllocator::new()))
                .unwrap();
        app.start().await.unwrap();
        assert!(app.is_running().await);

        // first tick fires immediately
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(storage.stats().await.unwrap().total_pending_requests, 0);

        app.shutdown().await;
        assert!(!app.is_running().await);
    }
}
