//! Allocation webhook client and test mock

use crate::allocation::Allocator;
use crate::error::{MatchmakingError, Result};
use crate::types::{AllocationRequest, AllocationResponse, GameSession};
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Per-call timeout against the allocation webhook
const ALLOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the configured allocation webhook
pub struct HttpAllocator {
    webhook_url: String,
    client: reqwest::Client,
}

impl HttpAllocator {
    /// Create an allocator targeting the given webhook URL
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(ALLOCATION_TIMEOUT)
            .user_agent(concat!("mm-rules-allocator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build allocation http client")?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl Allocator for HttpAllocator {
    async fn allocate_session(&self, request: &AllocationRequest) -> Result<GameSession> {
        debug!(
            match_id = %request.match_id,
            game_id = %request.game_id,
            players = request.players.len(),
            "requesting session allocation"
        );

        let response = self
            .client
            .post(&self.webhook_url)
            .json(request)
            .send()
            .await
            .map_err(|e| MatchmakingError::AllocationFailed {
                reason: format!("failed to reach allocation service: {}", e),
            })?;

        let allocation: AllocationResponse =
            response
                .json()
                .await
                .map_err(|e| MatchmakingError::AllocationFailed {
                    reason: format!("failed to decode allocation response: {}", e),
                })?;

        if !allocation.success {
            let reason = allocation
                .error
                .unwrap_or_else(|| "allocation failed with unknown error".to_string());
            return Err(MatchmakingError::AllocationFailed { reason }.into());
        }

        allocation.session.ok_or_else(|| {
            MatchmakingError::AllocationFailed {
                reason: "allocation succeeded but no session returned".to_string(),
            }
            .into()
        })
    }
}

/// Scriptable allocator for tests: sessions and errors can be registered
/// per match id, everything else gets a generated session.
#[derive(Default)]
pub struct MockAllocator {
    sessions: Mutex<HashMap<String, GameSession>>,
    errors: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<AllocationRequest>>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session to return for a specific match
    pub fn set_session(&self, match_id: &str, session: GameSession) {
        self.sessions
            .lock()
            .expect("mock lock")
            .insert(match_id.to_string(), session);
    }

    /// Register a failure reason for a specific match
    pub fn set_error(&self, match_id: &str, reason: &str) {
        self.errors
            .lock()
            .expect("mock lock")
            .insert(match_id.to_string(), reason.to_string());
    }

    /// Clear a registered failure, letting later attempts succeed
    pub fn clear_error(&self, match_id: &str) {
        self.errors.lock().expect("mock lock").remove(match_id);
    }

    /// Every allocation request received so far
    pub fn calls(&self) -> Vec<AllocationRequest> {
        self.calls.lock().expect("mock lock").clone()
    }
}

#[async_trait]
impl Allocator for MockAllocator {
    async fn allocate_session(&self, request: &AllocationRequest) -> Result<GameSession> {
        self.calls.lock().expect("mock lock").push(request.clone());

        if let Some(reason) = self
            .errors
            .lock()
            .expect("mock lock")
            .get(&request.match_id)
        {
            return Err(MatchmakingError::AllocationFailed {
                reason: reason.clone(),
            }
            .into());
        }

        if let Some(session) = self
            .sessions
            .lock()
            .expect("mock lock")
            .get(&request.match_id)
        {
            return Ok(session.clone());
        }

        Ok(GameSession {
            ip: "192.168.1.100".to_string(),
            port: 7777,
            id: format!("session-{}", request.match_id),
        })
    }
}
