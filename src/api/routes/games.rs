use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{Game, GameId, GameResult};

#[derive(Debug, Deserialize)]
pub struct SetResultRequest {
    /// `white`, `black`, `draw` or the `1-0` / `0-1` / `1/2-1/2` notation
    pub result: String,
}

pub async fn set_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SetResultRequest>, JsonRejection>,
) -> Result<Json<Game>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let result: GameResult = request.result.parse().map_err(ApiError::BadRequest)?;

    let game = state
        .controller
        .set_result(&GameId::from(id), result)
        .await?;
    Ok(Json(game))
}
