//! Mapping from domain errors to HTTP responses

use crate::error::MatchmakingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Wrapper turning service-layer errors into HTTP responses.
///
/// Domain errors carry their own status mapping: bad input becomes 400,
/// the not-found family becomes 404, everything else is a 500.
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<MatchmakingError>() {
            Some(domain) if domain.is_bad_input() => StatusCode::BAD_REQUEST,
            Some(domain) if domain.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = ?self.0, "request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(err: anyhow::Error) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(
                MatchmakingError::InvalidGameConfig {
                    reason: "no teams".to_string()
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(
                MatchmakingError::ConfigNotFound {
                    game_id: "g".to_string()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(
                MatchmakingError::RequestNotFound {
                    request_id: "r".to_string()
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(anyhow::anyhow!("backend exploded")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
