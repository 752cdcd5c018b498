//! REST API endpoints.
//!
//! Axum-based HTTP API over the round controller: standings, round
//! advancement, round games and result entry.

pub mod routes;
pub mod state;

use axum::{
    http::{header::InvalidHeaderValue, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::rounds::RoundError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Pairing impossible: {0}")]
    PairingImpossible(String),

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RoundError> for ApiError {
    fn from(err: RoundError) -> Self {
        match err {
            RoundError::NotFound(msg) => ApiError::NotFound(msg),
            RoundError::InvalidState(msg) => ApiError::InvalidState(msg),
            RoundError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            RoundError::PairingImpossible(msg) => ApiError::PairingImpossible(msg),
            RoundError::InternalInconsistency(msg) => ApiError::InternalInconsistency(msg),
            RoundError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::InvalidState(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
            ApiError::PairingImpossible(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "PAIRING_IMPOSSIBLE")
            }
            ApiError::InternalInconsistency(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_INCONSISTENCY")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        if status.is_server_error() {
            error!("{}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Build the application router with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/tournaments", get(routes::tournaments::list_tournaments))
        .route("/api/tournaments/:id", get(routes::tournaments::get_tournament))
        .route(
            "/api/tournaments/:id/players",
            get(routes::tournaments::get_players),
        )
        .route(
            "/api/tournaments/:id/standings",
            get(routes::tournaments::get_standings),
        )
        .route(
            "/api/tournaments/:id/rounds",
            post(routes::tournaments::advance_round),
        )
        .route(
            "/api/tournaments/:id/rounds/:round/games",
            get(routes::tournaments::get_round_games),
        )
        .route(
            "/api/tournaments/:id/complete",
            post(routes::tournaments::complete_tournament),
        )
        .route("/api/games/:id/result", post(routes::games::set_result))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for a configured origin; `*` allows any.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    if origin == "*" {
        return Ok(CorsLayer::permissive());
    }
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}
