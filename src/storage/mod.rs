//! Game ledger storage.
//!
//! The ledger holds players, tournaments, enrollments and games. Two
//! backends implement the `Store` trait:
//! - `MemoryStore`: in-process only
//! - `JsonlStore`: JSON Lines files under the data directory

mod jsonl;
mod memory;
mod state;

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{
    EnrolledPlayer, Enrollment, Game, GameId, GameResult, Player, PlayerId, Tournament,
    TournamentId, TournamentStatus,
};

pub use jsonl::{EntityType, JsonlReader, JsonlStore, JsonlWriter};
pub use memory::MemoryStore;
pub use state::LedgerState;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional write lost against the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    pub fn path_for(&self, entity: EntityType) -> PathBuf {
        self.ledger_dir().join(entity.filename())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// A consistent point-in-time view of one tournament.
#[derive(Debug, Clone)]
pub struct TournamentSnapshot {
    pub tournament: Tournament,
    pub players: Vec<EnrolledPlayer>,
    pub games: Vec<Game>,
    /// Bumped on every mutation touching this tournament
    pub revision: u64,
}

impl TournamentSnapshot {
    /// Games of one round, in board order.
    pub fn round_games(&self, round: u32) -> Vec<&Game> {
        let mut games: Vec<&Game> = self.games.iter().filter(|g| g.round == round).collect();
        games.sort_by_key(|g| g.board);
        games
    }
}

/// Ledger persistence.
///
/// Conditional writes (`commit_round`, `record_result`, `enroll`) check
/// their precondition and apply under one write guard, returning
/// `StorageError::Conflict` when it no longer holds.
pub trait Store: Send + Sync {
    fn insert_player(&self, player: Player) -> Result<(), StorageError>;

    fn player(&self, id: &PlayerId) -> Result<Option<Player>, StorageError>;

    fn set_player_active(&self, id: &PlayerId, active: bool) -> Result<Player, StorageError>;

    fn insert_tournament(&self, tournament: Tournament) -> Result<(), StorageError>;

    fn tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StorageError>;

    fn list_tournaments(&self) -> Result<Vec<Tournament>, StorageError>;

    /// Add an enrollment; conflicts if duplicated or the tournament started.
    fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError>;

    /// Remove an enrollment; conflicts once the tournament started.
    fn withdraw(&self, tournament_id: &TournamentId, player_id: &PlayerId)
        -> Result<(), StorageError>;

    fn snapshot(&self, id: &TournamentId) -> Result<Option<TournamentSnapshot>, StorageError>;

    fn game(&self, id: &GameId) -> Result<Option<Game>, StorageError>;

    /// Append a round's games and advance `current_round` from
    /// `expected_round` to `expected_round + 1` in one step.
    fn commit_round(
        &self,
        tournament_id: &TournamentId,
        expected_round: u32,
        games: Vec<Game>,
    ) -> Result<Tournament, StorageError>;

    /// Set a result on a game that is still unset.
    fn record_result(&self, game_id: &GameId, result: GameResult) -> Result<Game, StorageError>;

    fn set_status(
        &self,
        tournament_id: &TournamentId,
        status: TournamentStatus,
    ) -> Result<Tournament, StorageError>;
}
