use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{EnrolledPlayer, Game, StandingsRow, Tournament, TournamentId};

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub round: u32,
}

pub async fn list_tournaments(
    State(state): State<AppState>,
) -> Result<Json<Vec<Tournament>>, ApiError> {
    let mut tournaments = state.controller.list_tournaments()?;
    tournaments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
    Ok(Json(tournaments))
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tournament>, ApiError> {
    let tournament = state.controller.tournament(&TournamentId::from(id))?;
    Ok(Json(tournament))
}

pub async fn get_players(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EnrolledPlayer>>, ApiError> {
    let players = state.controller.players(&TournamentId::from(id))?;
    Ok(Json(players))
}

pub async fn get_standings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StandingsRow>>, ApiError> {
    let rows = state.controller.standings(&TournamentId::from(id))?;
    Ok(Json(rows))
}

pub async fn advance_round(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let round = state.controller.advance_round(&TournamentId::from(id)).await?;
    Ok(Json(AdvanceResponse { round }))
}

pub async fn get_round_games(
    State(state): State<AppState>,
    Path((id, round)): Path<(String, u32)>,
) -> Result<Json<Vec<Game>>, ApiError> {
    let games = state.controller.games(&TournamentId::from(id), round)?;
    Ok(Json(games))
}

pub async fn complete_tournament(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Tournament>, ApiError> {
    let tournament = state
        .controller
        .complete_tournament(&TournamentId::from(id))
        .await?;
    Ok(Json(tournament))
}
