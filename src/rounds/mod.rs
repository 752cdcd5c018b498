//! Round lifecycle.
//!
//! `RoundController` owns the write path for a tournament: it checks round
//! preconditions, runs the pairing strategy and commits the new round's
//! games together with the round counter. Advances and status changes for
//! one tournament are serialized by a per-tournament async mutex, and the
//! store's compare-and-swap on `current_round` backs that up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PairingConfig;
use crate::models::{
    EnrolledPlayer, EntityId, Enrollment, Game, GameId, GameResult, Player, PlayerId, RatingBand,
    StandingsRow, Tournament, TournamentFormat, TournamentId, TournamentStatus,
};
use crate::pairing::{
    build_games, order_for_round, strategy_for, validate_plan, PairingError, PairingHistory,
};
use crate::standings::{compute_standings, StandingsCache};
use crate::storage::{StorageError, Store, TournamentSnapshot};

/// Errors surfaced by round operations.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// The tournament or game is not in a state that allows the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pairing impossible: {0}")]
    PairingImpossible(String),

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for RoundError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => RoundError::NotFound(what),
            StorageError::Conflict(what) => RoundError::InvalidState(what),
            other => RoundError::Storage(other),
        }
    }
}

impl From<PairingError> for RoundError {
    fn from(err: PairingError) -> Self {
        match err {
            PairingError::Impossible(msg) => RoundError::PairingImpossible(msg),
            PairingError::InternalInconsistency(msg) => RoundError::InternalInconsistency(msg),
            unsupported @ PairingError::UnsupportedFormat(_) => {
                RoundError::InvalidState(unsupported.to_string())
            }
        }
    }
}

type TournamentLock = Arc<tokio::sync::Mutex<()>>;

/// Coordinates registry, pairing, result entry and standings over a store.
pub struct RoundController {
    store: Arc<dyn Store>,
    settings: PairingConfig,
    locks: Mutex<HashMap<TournamentId, TournamentLock>>,
    cache: StandingsCache,
}

impl RoundController {
    pub fn new(store: Arc<dyn Store>, settings: PairingConfig) -> Self {
        Self {
            store,
            settings,
            locks: Mutex::new(HashMap::new()),
            cache: StandingsCache::new(),
        }
    }

    fn lock_for(&self, id: &TournamentId) -> Result<TournamentLock, RoundError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| RoundError::Storage(StorageError::LockPoisoned))?;
        Ok(Arc::clone(locks.entry(id.clone()).or_default()))
    }

    fn snapshot(&self, id: &TournamentId) -> Result<TournamentSnapshot, RoundError> {
        self.store
            .snapshot(id)?
            .ok_or_else(|| RoundError::NotFound(format!("tournament {}", id)))
    }

    // Registry

    pub fn create_tournament(
        &self,
        name: &str,
        format: TournamentFormat,
        rounds: u32,
        rating_band: Option<RatingBand>,
    ) -> Result<Tournament, RoundError> {
        if name.trim().is_empty() {
            return Err(RoundError::InvalidArgument(
                "tournament name must not be empty".to_string(),
            ));
        }
        if rounds == 0 {
            return Err(RoundError::InvalidArgument(
                "round count must be greater than 0".to_string(),
            ));
        }

        let mut tournament = Tournament::new(name.trim().to_string(), format, rounds);
        if let Some(band) = rating_band {
            if !band.is_valid() {
                return Err(RoundError::InvalidArgument(format!(
                    "rating band {}-{} is empty",
                    band.min_rating, band.max_rating
                )));
            }
            tournament = tournament.with_rating_band(band);
        }

        self.store.insert_tournament(tournament.clone())?;
        info!(
            "Created tournament {} ({}, {} rounds, {})",
            tournament.id, tournament.name, tournament.rounds, tournament.format
        );
        Ok(tournament)
    }

    pub fn register_player(
        &self,
        id: Option<PlayerId>,
        name: &str,
        rating: u32,
    ) -> Result<Player, RoundError> {
        if name.trim().is_empty() {
            return Err(RoundError::InvalidArgument(
                "player name must not be empty".to_string(),
            ));
        }
        let id = id.unwrap_or_else(EntityId::random);
        let player = Player::new(id, name.trim().to_string(), rating);
        self.store.insert_player(player.clone())?;
        debug!("Registered player {} ({})", player.id, player.rating);
        Ok(player)
    }

    pub fn set_player_active(&self, id: &PlayerId, active: bool) -> Result<Player, RoundError> {
        let player = self.store.set_player_active(id, active)?;
        info!("Player {} active={}", player.id, player.active);
        Ok(player)
    }

    /// Enroll a player before round one.
    pub fn enroll(
        &self,
        tournament_id: &TournamentId,
        player_id: &PlayerId,
        seed: Option<u32>,
    ) -> Result<(), RoundError> {
        let tournament = self.tournament(tournament_id)?;
        if tournament.status != TournamentStatus::Upcoming {
            return Err(RoundError::InvalidState(format!(
                "tournament {} is {}, enrollment is closed",
                tournament.id, tournament.status
            )));
        }
        let player = self
            .store
            .player(player_id)?
            .ok_or_else(|| RoundError::NotFound(format!("player {}", player_id)))?;
        if !tournament.accepts_rating(player.rating) {
            return Err(RoundError::InvalidState(format!(
                "rating {} of {} is outside the tournament's band",
                player.rating, player.id
            )));
        }

        self.store
            .enroll(Enrollment::new(tournament_id.clone(), player_id.clone(), seed))?;
        debug!("Enrolled {} in {}", player_id, tournament_id);
        Ok(())
    }

    /// Withdraw a player; only possible before round one.
    pub fn withdraw(
        &self,
        tournament_id: &TournamentId,
        player_id: &PlayerId,
    ) -> Result<(), RoundError> {
        self.store.withdraw(tournament_id, player_id)?;
        info!("Withdrew {} from {}", player_id, tournament_id);
        Ok(())
    }

    // Queries

    pub fn tournament(&self, id: &TournamentId) -> Result<Tournament, RoundError> {
        self.store
            .tournament(id)?
            .ok_or_else(|| RoundError::NotFound(format!("tournament {}", id)))
    }

    pub fn list_tournaments(&self) -> Result<Vec<Tournament>, RoundError> {
        Ok(self.store.list_tournaments()?)
    }

    pub fn players(&self, id: &TournamentId) -> Result<Vec<EnrolledPlayer>, RoundError> {
        Ok(self.snapshot(id)?.players)
    }

    /// Games of a committed round, in board order.
    pub fn games(&self, id: &TournamentId, round: u32) -> Result<Vec<Game>, RoundError> {
        if round == 0 {
            return Err(RoundError::InvalidArgument(
                "rounds are numbered from 1".to_string(),
            ));
        }
        let snapshot = self.snapshot(id)?;
        if round > snapshot.tournament.current_round {
            return Err(RoundError::NotFound(format!(
                "round {} of tournament {}",
                round, id
            )));
        }
        Ok(snapshot.round_games(round).into_iter().cloned().collect())
    }

    /// Ranked standings from the terminal games.
    pub fn standings(&self, id: &TournamentId) -> Result<Vec<StandingsRow>, RoundError> {
        let snapshot = self.snapshot(id)?;
        if let Some(rows) = self.cache.get(id, snapshot.revision) {
            return Ok(rows);
        }

        let rows = compute_standings(
            &snapshot.players,
            &snapshot.games,
            self.settings.bye_buchholz,
        );
        self.cache.put(id, snapshot.revision, rows.clone());
        Ok(rows)
    }

    // Rounds

    /// Pair the next round without committing it.
    pub fn generate_next_round(&self, id: &TournamentId) -> Result<Vec<Game>, RoundError> {
        let snapshot = self.snapshot(id)?;
        self.plan_round(&snapshot)
    }

    fn plan_round(&self, snapshot: &TournamentSnapshot) -> Result<Vec<Game>, RoundError> {
        let tournament = &snapshot.tournament;
        if tournament.status.is_closed() {
            return Err(RoundError::InvalidState(format!(
                "tournament {} is {}",
                tournament.id, tournament.status
            )));
        }
        if !tournament.has_rounds_remaining() {
            return Err(RoundError::InvalidState(format!(
                "all {} rounds of tournament {} have been paired",
                tournament.rounds, tournament.id
            )));
        }
        if tournament.has_started() {
            let pending = snapshot
                .round_games(tournament.current_round)
                .into_iter()
                .filter(|g| !g.is_terminal())
                .count();
            if pending > 0 {
                return Err(RoundError::InvalidState(format!(
                    "round {} still has {} games without a result",
                    tournament.current_round, pending
                )));
            }
        }

        let strategy = strategy_for(tournament.format)?;
        let active = snapshot.players.iter().filter(|p| p.player.active).count();
        if active < 2 {
            return Err(RoundError::InvalidState(format!(
                "need at least 2 active players, have {}",
                active
            )));
        }

        let first_round = !tournament.has_started();
        let standings = if first_round {
            Vec::new()
        } else {
            compute_standings(
                &snapshot.players,
                &snapshot.games,
                self.settings.bye_buchholz,
            )
        };
        let ranked = order_for_round(&snapshot.players, &standings, first_round);
        let history = PairingHistory::from_games(&snapshot.games);

        let plan = strategy.pair(&ranked, &history, &self.settings.options())?;
        validate_plan(&ranked, &history, &plan)?;

        let round = tournament.current_round + 1;
        debug!(
            "{} pairing for round {} of {}: {} boards, bye {:?}",
            strategy.name(),
            round,
            tournament.id,
            plan.pairings.len(),
            plan.bye
        );
        Ok(build_games(&tournament.id, round, &plan, &ranked))
    }

    /// Pair and commit the next round, returning its number.
    pub async fn advance_round(&self, id: &TournamentId) -> Result<u32, RoundError> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(id)?;
        let games = match self.plan_round(&snapshot) {
            Ok(games) => games,
            Err(err) => {
                warn!("Cannot advance tournament {}: {}", id, err);
                return Err(err);
            }
        };
        let board_count = games.len();

        let tournament = self
            .store
            .commit_round(id, snapshot.tournament.current_round, games)?;
        info!(
            "Tournament {} advanced to round {}/{} ({} boards)",
            id, tournament.current_round, tournament.rounds, board_count
        );
        Ok(tournament.current_round)
    }

    /// Record the result of an unplayed game.
    pub async fn set_result(&self, game_id: &GameId, result: GameResult) -> Result<Game, RoundError> {
        if matches!(result, GameResult::Unset | GameResult::Bye) {
            return Err(RoundError::InvalidState(format!(
                "result {} cannot be entered",
                result
            )));
        }

        let game = self
            .store
            .game(game_id)?
            .ok_or_else(|| RoundError::NotFound(format!("game {}", game_id)))?;
        if game.is_bye() {
            return Err(RoundError::InvalidState(format!(
                "game {} is a bye",
                game_id
            )));
        }
        if game.is_terminal() {
            return Err(RoundError::InvalidState(format!(
                "game {} already has result {}",
                game_id, game.result
            )));
        }
        let tournament = self.tournament(&game.tournament_id)?;
        if tournament.status != TournamentStatus::Ongoing {
            return Err(RoundError::InvalidState(format!(
                "tournament {} is {}",
                tournament.id, tournament.status
            )));
        }

        let updated = self.store.record_result(game_id, result)?;
        info!(
            "Result {} on board {} of round {} ({})",
            result, updated.board, updated.round, updated.tournament_id
        );

        // The result is committed at this point; completion can be retried
        // through complete_tournament.
        if self.settings.auto_complete {
            if let Err(e) = self.complete_if_finished(&updated.tournament_id).await {
                warn!(
                    "Auto-completion of tournament {} failed: {}",
                    updated.tournament_id, e
                );
            }
        }
        Ok(updated)
    }

    async fn complete_if_finished(&self, id: &TournamentId) -> Result<(), RoundError> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(id)?;
        if snapshot.tournament.status == TournamentStatus::Ongoing && is_finished(&snapshot) {
            self.store.set_status(id, TournamentStatus::Completed)?;
            info!("Tournament {} completed", id);
        }
        Ok(())
    }

    /// Mark a tournament completed once its last round has all results.
    pub async fn complete_tournament(&self, id: &TournamentId) -> Result<Tournament, RoundError> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock().await;

        let snapshot = self.snapshot(id)?;
        let tournament = &snapshot.tournament;
        match tournament.status {
            TournamentStatus::Completed => return Ok(snapshot.tournament),
            TournamentStatus::Cancelled => {
                return Err(RoundError::InvalidState(format!(
                    "tournament {} is cancelled",
                    tournament.id
                )))
            }
            _ => {}
        }
        if !is_finished(&snapshot) {
            return Err(RoundError::InvalidState(format!(
                "tournament {} is at round {}/{} with results outstanding",
                tournament.id, tournament.current_round, tournament.rounds
            )));
        }

        let updated = self.store.set_status(id, TournamentStatus::Completed)?;
        info!("Tournament {} completed", id);
        Ok(updated)
    }

    pub async fn cancel_tournament(&self, id: &TournamentId) -> Result<Tournament, RoundError> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock().await;

        let tournament = self.tournament(id)?;
        match tournament.status {
            TournamentStatus::Cancelled => Ok(tournament),
            TournamentStatus::Completed => Err(RoundError::InvalidState(format!(
                "tournament {} is already completed",
                id
            ))),
            _ => {
                let updated = self.store.set_status(id, TournamentStatus::Cancelled)?;
                self.cache.invalidate(id);
                info!("Tournament {} cancelled at round {}", id, updated.current_round);
                Ok(updated)
            }
        }
    }
}

/// Final round committed and every game in it terminal.
fn is_finished(snapshot: &TournamentSnapshot) -> bool {
    let tournament = &snapshot.tournament;
    tournament.current_round == tournament.rounds
        && snapshot
            .round_games(tournament.current_round)
            .iter()
            .all(|g| g.is_terminal())
}
