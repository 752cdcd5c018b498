//! In-memory ledger state shared by every store backend.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::warn;

use super::{StorageError, TournamentSnapshot};
use crate::models::{
    EnrolledPlayer, Enrollment, Game, GameId, GameResult, Player, PlayerId, Tournament,
    TournamentId, TournamentStatus,
};

/// Players, tournaments, enrollments and games with per-tournament revisions.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    players: BTreeMap<PlayerId, Player>,
    tournaments: BTreeMap<TournamentId, Tournament>,
    enrollments: Vec<Enrollment>,
    games: Vec<Game>,
    revisions: HashMap<TournamentId, u64>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from persisted rows.
    ///
    /// Later rows win when an id repeats. Games from a round the tournament
    /// never committed are dropped.
    pub fn from_parts(
        players: Vec<Player>,
        tournaments: Vec<Tournament>,
        enrollments: Vec<Enrollment>,
        games: Vec<Game>,
    ) -> Self {
        let players: BTreeMap<PlayerId, Player> =
            players.into_iter().map(|p| (p.id.clone(), p)).collect();
        let tournaments: BTreeMap<TournamentId, Tournament> =
            tournaments.into_iter().map(|t| (t.id.clone(), t)).collect();

        let mut seen: HashSet<(TournamentId, PlayerId)> = HashSet::new();
        let mut kept_enrollments: Vec<Enrollment> = enrollments
            .into_iter()
            .rev()
            .filter(|e| seen.insert((e.tournament_id.clone(), e.player_id.clone())))
            .collect();
        kept_enrollments.reverse();

        let mut seen: HashSet<GameId> = HashSet::new();
        let mut kept_games: Vec<Game> = games
            .into_iter()
            .rev()
            .filter(|g| seen.insert(g.id.clone()))
            .collect();
        kept_games.reverse();

        let before = kept_games.len();
        kept_games.retain(|g| {
            tournaments
                .get(&g.tournament_id)
                .is_some_and(|t| g.round >= 1 && g.round <= t.current_round)
        });
        if kept_games.len() < before {
            warn!(
                "Dropped {} games from uncommitted rounds",
                before - kept_games.len()
            );
        }

        Self {
            players,
            tournaments,
            enrollments: kept_enrollments,
            games: kept_games,
            revisions: HashMap::new(),
        }
    }

    pub fn players(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    pub fn tournaments(&self) -> Vec<Tournament> {
        self.tournaments.values().cloned().collect()
    }

    pub fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }

    pub fn games(&self) -> &[Game] {
        &self.games
    }

    pub fn revision(&self, tournament_id: &TournamentId) -> u64 {
        self.revisions.get(tournament_id).copied().unwrap_or(0)
    }

    fn bump(&mut self, tournament_id: &TournamentId) {
        *self.revisions.entry(tournament_id.clone()).or_default() += 1;
    }

    pub fn insert_player(&mut self, player: Player) -> Result<(), StorageError> {
        if self.players.contains_key(&player.id) {
            return Err(StorageError::Conflict(format!(
                "player {} already exists",
                player.id
            )));
        }
        self.players.insert(player.id.clone(), player);
        Ok(())
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn set_player_active(&mut self, id: &PlayerId, active: bool) -> Result<Player, StorageError> {
        let player = self
            .players
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("player {}", id)))?;
        player.active = active;
        let updated = player.clone();

        let affected: Vec<TournamentId> = self
            .enrollments
            .iter()
            .filter(|e| &e.player_id == id)
            .map(|e| e.tournament_id.clone())
            .collect();
        for tournament_id in &affected {
            self.bump(tournament_id);
        }
        Ok(updated)
    }

    pub fn insert_tournament(&mut self, tournament: Tournament) -> Result<(), StorageError> {
        if self.tournaments.contains_key(&tournament.id) {
            return Err(StorageError::Conflict(format!(
                "tournament {} already exists",
                tournament.id
            )));
        }
        self.bump(&tournament.id);
        self.tournaments.insert(tournament.id.clone(), tournament);
        Ok(())
    }

    pub fn tournament(&self, id: &TournamentId) -> Option<&Tournament> {
        self.tournaments.get(id)
    }

    pub fn enroll(&mut self, enrollment: Enrollment) -> Result<(), StorageError> {
        let tournament = self.tournaments.get(&enrollment.tournament_id).ok_or_else(|| {
            StorageError::NotFound(format!("tournament {}", enrollment.tournament_id))
        })?;
        if !self.players.contains_key(&enrollment.player_id) {
            return Err(StorageError::NotFound(format!(
                "player {}",
                enrollment.player_id
            )));
        }
        if tournament.has_started() {
            return Err(StorageError::Conflict(format!(
                "tournament {} already started",
                tournament.id
            )));
        }
        if self.is_enrolled(&enrollment.tournament_id, &enrollment.player_id) {
            return Err(StorageError::Conflict(format!(
                "player {} already enrolled in {}",
                enrollment.player_id, enrollment.tournament_id
            )));
        }

        let tournament_id = enrollment.tournament_id.clone();
        self.enrollments.push(enrollment);
        self.bump(&tournament_id);
        Ok(())
    }

    pub fn is_enrolled(&self, tournament_id: &TournamentId, player_id: &PlayerId) -> bool {
        self.enrollments
            .iter()
            .any(|e| &e.tournament_id == tournament_id && &e.player_id == player_id)
    }

    pub fn withdraw(
        &mut self,
        tournament_id: &TournamentId,
        player_id: &PlayerId,
    ) -> Result<(), StorageError> {
        let tournament = self
            .tournaments
            .get(tournament_id)
            .ok_or_else(|| StorageError::NotFound(format!("tournament {}", tournament_id)))?;
        if tournament.has_started() {
            return Err(StorageError::Conflict(format!(
                "tournament {} already started",
                tournament_id
            )));
        }
        if !self.is_enrolled(tournament_id, player_id) {
            return Err(StorageError::NotFound(format!(
                "enrollment of {} in {}",
                player_id, tournament_id
            )));
        }

        self.enrollments
            .retain(|e| !(&e.tournament_id == tournament_id && &e.player_id == player_id));
        self.bump(tournament_id);
        Ok(())
    }

    pub fn snapshot(&self, id: &TournamentId) -> Option<TournamentSnapshot> {
        let tournament = self.tournaments.get(id)?.clone();
        let players = self
            .enrollments
            .iter()
            .filter(|e| &e.tournament_id == id)
            .filter_map(|e| {
                self.players
                    .get(&e.player_id)
                    .map(|p| EnrolledPlayer::new(p.clone(), e.seed))
            })
            .collect();
        let games = self
            .games
            .iter()
            .filter(|g| &g.tournament_id == id)
            .cloned()
            .collect();

        Some(TournamentSnapshot {
            tournament,
            players,
            games,
            revision: self.revision(id),
        })
    }

    pub fn game(&self, id: &GameId) -> Option<&Game> {
        self.games.iter().find(|g| &g.id == id)
    }

    pub fn commit_round(
        &mut self,
        tournament_id: &TournamentId,
        expected_round: u32,
        games: Vec<Game>,
    ) -> Result<Tournament, StorageError> {
        let tournament = self
            .tournaments
            .get(tournament_id)
            .ok_or_else(|| StorageError::NotFound(format!("tournament {}", tournament_id)))?;
        if tournament.current_round != expected_round {
            return Err(StorageError::Conflict(format!(
                "tournament {} is at round {}, expected {}",
                tournament_id, tournament.current_round, expected_round
            )));
        }
        if tournament.status.is_closed() {
            return Err(StorageError::Conflict(format!(
                "tournament {} is {}",
                tournament_id, tournament.status
            )));
        }

        let round = expected_round + 1;
        if let Some(stray) = games
            .iter()
            .find(|g| g.round != round || &g.tournament_id != tournament_id)
        {
            return Err(StorageError::Conflict(format!(
                "game {} does not belong to round {} of {}",
                stray.id, round, tournament_id
            )));
        }
        if let Some(existing) = games.iter().find(|g| self.game(&g.id).is_some()) {
            return Err(StorageError::Conflict(format!(
                "game {} already exists",
                existing.id
            )));
        }

        let tournament = self
            .tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| StorageError::NotFound(format!("tournament {}", tournament_id)))?;
        tournament.current_round = round;
        if tournament.status == TournamentStatus::Upcoming {
            tournament.status = TournamentStatus::Ongoing;
        }
        let updated = tournament.clone();

        self.games.extend(games);
        self.bump(tournament_id);
        Ok(updated)
    }

    pub fn record_result(&mut self, game_id: &GameId, result: GameResult) -> Result<Game, StorageError> {
        let game = self
            .games
            .iter_mut()
            .find(|g| &g.id == game_id)
            .ok_or_else(|| StorageError::NotFound(format!("game {}", game_id)))?;
        if game.is_terminal() {
            return Err(StorageError::Conflict(format!(
                "game {} already has result {}",
                game_id, game.result
            )));
        }
        let status = self
            .tournaments
            .get(&game.tournament_id)
            .map(|t| t.status)
            .unwrap_or_default();
        if status != TournamentStatus::Ongoing {
            return Err(StorageError::Conflict(format!(
                "tournament {} is {}",
                game.tournament_id, status
            )));
        }
        game.complete(result);
        let updated = game.clone();

        self.bump(&updated.tournament_id);
        Ok(updated)
    }

    pub fn set_status(
        &mut self,
        tournament_id: &TournamentId,
        status: TournamentStatus,
    ) -> Result<Tournament, StorageError> {
        let tournament = self
            .tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| StorageError::NotFound(format!("tournament {}", tournament_id)))?;
        tournament.status = status;
        let updated = tournament.clone();

        self.bump(tournament_id);
        Ok(updated)
    }
}
