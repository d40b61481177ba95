//! Session allocation against the external allocation service
//!
//! A formed match becomes playable once the allocation webhook returns a
//! server endpoint for it. This module wraps that webhook behind the
//! [`Allocator`] trait, with a mock implementation for tests.

pub mod client;

pub use client::{HttpAllocator, MockAllocator};

use crate::error::Result;
use crate::types::{AllocationRequest, GameSession};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Trait for allocating game sessions
#[async_trait]
pub trait Allocator: Send + Sync {
    /// Request a session for a match, single attempt
    async fn allocate_session(&self, request: &AllocationRequest) -> Result<GameSession>;

    /// Request a session with bounded retries and a fixed delay between
    /// attempts; the last error is surfaced on exhaustion.
    async fn allocate_session_with_retry(
        &self,
        request: &AllocationRequest,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<GameSession> {
        for attempt in 0..max_retries {
            match self.allocate_session(request).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    warn!(
                        match_id = %request.match_id,
                        attempt = attempt + 1,
                        error = %e,
                        "session allocation attempt failed, retrying"
                    );
                    sleep(retry_delay).await;
                }
            }
        }

        // Final attempt surfaces its own error on exhaustion
        self.allocate_session(request).await.map_err(|e| {
            e.context(format!(
                "allocation failed after {} attempts",
                max_retries + 1
            ))
        })
    }
}

/// Validate an allocation request before submitting it
pub fn validate_request(request: &AllocationRequest) -> Result<()> {
    if request.match_id.is_empty() {
        anyhow::bail!("match_id is required");
    }
    if request.game_id.is_empty() {
        anyhow::bail!("game_id is required");
    }
    if request.players.is_empty() {
        anyhow::bail!("at least one player is required");
    }
    if request.team_name.is_empty() {
        anyhow::bail!("team_name is required");
    }
    Ok(())
}
