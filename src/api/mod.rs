//! HTTP API for the matchmaking service
//!
//! Routes follow the public contract: `/health` and `/metrics` at the root,
//! everything else under `/api/v1`. Handlers are thin wrappers over the
//! [`MatchmakingService`](crate::service::MatchmakingService).

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::metrics::MetricsCollector;
use crate::service::MatchmakingService;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub matchmaking: Arc<MatchmakingService>,
    pub metrics: Arc<MetricsCollector>,
}

/// Build the full API router
pub fn router(state: ApiState) -> Router {
    let v1 = Router::new()
        .route("/match-request", post(handlers::create_match_request))
        .route("/match-status/:request_id", get(handlers::get_match_status))
        .route("/rules/:game_id", post(handlers::create_game_config))
        .route(
            "/process-matchmaking/:game_id",
            post(handlers::process_matchmaking),
        )
        .route(
            "/allocate-sessions/:game_id",
            post(handlers::allocate_sessions),
        )
        .route("/stats", get(handlers::get_stats));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::get_metrics))
        .nest("/api/v1", v1)
        .with_state(state)
}
