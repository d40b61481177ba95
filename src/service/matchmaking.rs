//! Matchmaking orchestration
//!
//! Ties the rule engine, matcher, storage and allocator together. The API
//! handlers are thin wrappers over this service, and the integration tests
//! drive it directly through the storage trait.

use crate::allocation::{validate_request, Allocator};
use crate::error::{MatchmakingError, Result};
use crate::matchmaker::{pool_stats, FormedMatch, Matchmaker};
use crate::metrics::MetricsCollector;
use crate::rules::RuleEngine;
use crate::storage::Storage;
use crate::types::{
    AllocationRequest, GameConfig, GameSession, Match, MatchRequest, MatchStatusView, Metadata,
    RequestStatus, StorageStats,
};
use crate::utils::current_timestamp;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-match result of a session allocation batch
#[derive(Debug, Clone, Serialize)]
pub struct AllocationOutcome {
    pub match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<GameSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The main matchmaking service
pub struct MatchmakingService {
    storage: Arc<dyn Storage>,
    allocator: Arc<dyn Allocator>,
    matchmaker: Matchmaker,
    rule_engine: RuleEngine,
    metrics: Arc<MetricsCollector>,
    allocation_retries: u32,
    allocation_retry_delay: Duration,
}

impl MatchmakingService {
    /// Create a new matchmaking service
    pub fn new(
        storage: Arc<dyn Storage>,
        allocator: Arc<dyn Allocator>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            storage,
            allocator,
            matchmaker: Matchmaker::with_metrics(metrics.clone()),
            rule_engine: RuleEngine::new(),
            metrics,
            allocation_retries: 2,
            allocation_retry_delay: Duration::from_millis(500),
        }
    }

    /// Override the allocation retry policy
    pub fn with_allocation_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.allocation_retries = max_retries;
        self.allocation_retry_delay = retry_delay;
        self
    }

    /// Create a pending match request and enqueue it for its game
    pub async fn enqueue_request(
        &self,
        player_id: String,
        game_id: String,
        metadata: Metadata,
    ) -> Result<MatchRequest> {
        if player_id.is_empty() {
            return Err(invalid_request("player_id is required"));
        }
        if game_id.is_empty() {
            return Err(invalid_request("game_id is required"));
        }

        let request = MatchRequest::new(player_id, game_id, metadata);
        self.storage.store_match_request(&request).await?;

        self.metrics
            .record_match_request(&request.game_id, "pending");
        info!(
            request_id = %request.id,
            player_id = %request.player_id,
            game_id = %request.game_id,
            "created match request"
        );

        Ok(request)
    }

    /// Validate and persist a game configuration
    pub async fn upsert_game_config(&self, config: GameConfig) -> Result<()> {
        self.rule_engine.validate_game_config(&config)?;
        self.storage.store_game_config(&config).await?;

        info!(
            game_id = %config.game_id,
            teams = config.teams.len(),
            rules = config.rules.len(),
            "stored game configuration"
        );
        Ok(())
    }

    /// Run one matchmaking round trip for a game: fetch the queue, form
    /// matches and persist the bookkeeping for every selected request.
    pub async fn process_game(&self, game_id: &str) -> Result<Vec<Match>> {
        let config = self.storage.get_game_config(game_id).await?;
        let queue = self.storage.get_game_queue(game_id).await?;
        self.metrics.set_queue_size(game_id, queue.len());

        // A request whose queue removal failed after an earlier match must
        // not be selected again.
        let queue: Vec<_> = queue
            .into_iter()
            .filter(|request| request.status == RequestStatus::Pending)
            .collect();

        if queue.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let now = current_timestamp();
        let formed = self.matchmaker.process_pool(&queue, &config, now);
        self.metrics
            .observe_matchmaking_duration(game_id, started.elapsed().as_secs_f64());

        let mut matches = Vec::with_capacity(formed.len());
        for formed_match in formed {
            match self.commit_match(game_id, &formed_match).await {
                Ok(()) => {
                    self.metrics.record_match_created(game_id);
                    matches.push(formed_match.game_match);
                }
                Err(e) => {
                    warn!(
                        match_id = %formed_match.game_match.id,
                        error = %e,
                        "failed to persist match, skipping"
                    );
                }
            }
        }

        let stats = pool_stats(&queue, &matches, now);
        debug!(
            game_id = %game_id,
            total_players = stats.total_players,
            matched = stats.matched_players,
            unmatched = stats.unmatched_players,
            avg_wait_seconds = stats.avg_wait_seconds,
            "processed match pool"
        );
        info!(game_id = %game_id, matches = matches.len(), "processed matchmaking");

        Ok(matches)
    }

    /// Persist one formed match and the per-request bookkeeping.
    ///
    /// Storing the match record must succeed; the per-request steps are
    /// logged and skipped on failure, and the next cleanup or status read
    /// heals whatever they left behind.
    async fn commit_match(&self, game_id: &str, formed: &FormedMatch) -> Result<()> {
        let game_match = &formed.game_match;
        self.storage.store_match(game_match).await?;

        let all_players = game_match.all_players();
        for (team_name, request_ids) in &formed.team_requests {
            let team_players = game_match.teams.get(team_name).cloned().unwrap_or_default();

            for request_id in request_ids {
                if let Err(e) = self
                    .storage
                    .update_request_status(request_id, RequestStatus::Matched)
                    .await
                {
                    warn!(request_id = %request_id, error = %e, "failed to update request status");
                }

                let view = MatchStatusView {
                    match_id: Some(game_match.id.clone()),
                    team_name: Some(team_name.clone()),
                    players: Some(team_players.clone()),
                    all_players: Some(all_players.clone()),
                    created_at: Some(game_match.created_at),
                    ..MatchStatusView::with_status(RequestStatus::Matched)
                };
                if let Err(e) = self.storage.store_match_status(request_id, &view).await {
                    warn!(request_id = %request_id, error = %e, "failed to store match status");
                }

                if let Err(e) = self
                    .storage
                    .store_request_match(request_id, &game_match.id)
                    .await
                {
                    warn!(request_id = %request_id, error = %e, "failed to store request-match index");
                }

                if let Err(e) = self.storage.remove_from_queue(game_id, request_id).await {
                    warn!(request_id = %request_id, error = %e, "failed to remove request from queue");
                }
            }
        }

        Ok(())
    }

    /// Allocate sessions for a batch of matches. Failures never abort the
    /// batch: each outcome carries either a session or an error reason.
    pub async fn allocate_sessions(
        &self,
        game_id: &str,
        matches: Vec<Match>,
    ) -> Vec<AllocationOutcome> {
        let started = Instant::now();
        let mut outcomes = Vec::with_capacity(matches.len());

        for game_match in matches {
            let outcome = self.allocate_one(&game_match).await;
            let status = if outcome.session.is_some() {
                "success"
            } else {
                "failure"
            };
            self.metrics.record_allocation(game_id, status);
            outcomes.push(outcome);
        }

        self.metrics
            .observe_allocation_duration(game_id, started.elapsed().as_secs_f64());
        outcomes
    }

    async fn allocate_one(&self, game_match: &Match) -> AllocationOutcome {
        // A session is assigned at most once; re-submitting an allocated
        // match returns the existing session.
        if let Some(session) = &game_match.session {
            return AllocationOutcome {
                match_id: game_match.id.clone(),
                session: Some(session.clone()),
                error: None,
            };
        }

        let request = AllocationRequest::from_match(game_match);
        if let Err(e) = validate_request(&request) {
            return AllocationOutcome {
                match_id: game_match.id.clone(),
                session: None,
                error: Some(e.to_string()),
            };
        }

        match self
            .allocator
            .allocate_session_with_retry(
                &request,
                self.allocation_retries,
                self.allocation_retry_delay,
            )
            .await
        {
            Ok(session) => {
                let mut updated = game_match.clone();
                updated.session = Some(session.clone());
                if let Err(e) = self.storage.store_match(&updated).await {
                    warn!(match_id = %updated.id, error = %e, "failed to persist allocated session");
                }

                info!(
                    match_id = %game_match.id,
                    session_id = %session.id,
                    "allocated game session"
                );
                AllocationOutcome {
                    match_id: game_match.id.clone(),
                    session: Some(session),
                    error: None,
                }
            }
            Err(e) => AllocationOutcome {
                match_id: game_match.id.clone(),
                session: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Answer a status query for a request.
    ///
    /// The cached projection is preferred; a failed or missing cache read
    /// degrades to the request record, and an unknown request surfaces
    /// not-found. A cached `matched` view whose match has since gained a
    /// session is reported as `allocated` with the session attached.
    pub async fn request_status(&self, request_id: &str) -> Result<MatchStatusView> {
        if request_id.is_empty() {
            return Err(invalid_request("request_id is required"));
        }

        match self.storage.get_match_status(request_id).await {
            Ok(mut view) => {
                if view.status == RequestStatus::Matched {
                    if let Some(match_id) = view.match_id.clone() {
                        if let Ok(game_match) = self.storage.get_match(&match_id).await {
                            if let Some(session) = game_match.session {
                                view.status = RequestStatus::Allocated;
                                view.session = Some(session);
                            }
                        }
                    }
                }
                Ok(view)
            }
            Err(e) => {
                debug!(request_id = %request_id, error = %e, "no cached status, loading request");
                self.status_from_request(request_id).await
            }
        }
    }

    /// Rebuild a status view from the request record and the match index
    async fn status_from_request(&self, request_id: &str) -> Result<MatchStatusView> {
        let request = self.storage.get_match_request(request_id).await?;

        let mut view = MatchStatusView {
            created_at: Some(request.created_at),
            ..MatchStatusView::with_status(request.status)
        };

        if matches!(
            request.status,
            RequestStatus::Matched | RequestStatus::Allocated
        ) {
            if let Ok(match_id) = self.storage.get_match_id_for_request(request_id).await {
                if let Ok(game_match) = self.storage.get_match(&match_id).await {
                    view.match_id = Some(game_match.id.clone());
                    view.all_players = Some(game_match.all_players());
                    if let Some((team_name, players)) = game_match
                        .teams
                        .iter()
                        .find(|(_, players)| players.contains(&request.player_id))
                    {
                        view.team_name = Some(team_name.clone());
                        view.players = Some(players.clone());
                    }
                    if let Some(session) = game_match.session {
                        view.status = RequestStatus::Allocated;
                        view.session = Some(session);
                    }
                }
            }
        }

        Ok(view)
    }

    /// Storage counters for the stats endpoint
    pub async fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.stats().await
    }

    /// Probe the backing store
    pub async fn ping_storage(&self) -> Result<()> {
        self.storage.ping().await
    }

    /// The storage handle, shared with background tasks
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }
}

fn invalid_request(reason: &str) -> anyhow::Error {
    MatchmakingError::InvalidRequest {
        reason: reason.to_string(),
    }
    .into()
}
