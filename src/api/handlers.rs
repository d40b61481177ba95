//! HTTP request handlers

use crate::api::{ApiError, ApiState};
use crate::types::{GameConfig, Match, Metadata};
use crate::utils::current_timestamp;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// Request body for creating a match request
#[derive(Debug, Deserialize)]
pub struct CreateMatchRequestBody {
    pub player_id: String,
    pub game_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// POST /api/v1/match-request
pub async fn create_match_request(
    State(state): State<ApiState>,
    Json(body): Json<CreateMatchRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .matchmaking
        .enqueue_request(body.player_id, body.game_id, body.metadata)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "request_id": request.id,
            "status": request.status,
        })),
    ))
}

/// GET /api/v1/match-status/:request_id
pub async fn get_match_status(
    State(state): State<ApiState>,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.matchmaking.request_status(&request_id).await?;
    Ok(Json(view))
}

/// POST /api/v1/rules/:game_id
pub async fn create_game_config(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
    Json(mut config): Json<GameConfig>,
) -> Result<impl IntoResponse, ApiError> {
    // the path parameter wins over whatever the body carries
    config.game_id = game_id;
    state.matchmaking.upsert_game_config(config.clone()).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "game_id": config.game_id,
            "message": "Game configuration created successfully",
        })),
    ))
}

/// POST /api/v1/process-matchmaking/:game_id
pub async fn process_matchmaking(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let matches = state.matchmaking.process_game(&game_id).await?;

    let message = if matches.is_empty() {
        "No matches could be formed"
    } else {
        "Matchmaking processed successfully"
    };

    Ok(Json(json!({
        "message": message,
        "matches": matches,
    })))
}

/// POST /api/v1/allocate-sessions/:game_id
pub async fn allocate_sessions(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
    Json(matches): Json<Vec<Match>>,
) -> Result<impl IntoResponse, ApiError> {
    let allocations = state.matchmaking.allocate_sessions(&game_id, matches).await;
    Ok(Json(json!({ "allocations": allocations })))
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let storage = state.matchmaking.storage_stats().await?;
    Ok(Json(json!({
        "storage": storage,
        "timestamp": current_timestamp(),
    })))
}

/// GET /health
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    match state.matchmaking.ping_storage().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": current_timestamp(),
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "error": e.to_string(),
            })),
        ),
    }
}

/// GET /metrics
pub async fn get_metrics(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.gather_text()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
