//! JSONL (JSON Lines) storage.
//!
//! Each ledger entity type lives in its own file under `data_dir/ledger`,
//! one JSON object per line. Games and enrollments are appended; players
//! and tournaments are rewritten whole through a temp file and rename.
//!
//! A round is committed by appending its games before rewriting the
//! tournaments file. On load, games from a round the tournament never
//! reached are dropped, so a crash between the two writes leaves no
//! partial round behind. A later line for the same game id replaces the
//! earlier one, which is how result updates are stored.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::{LedgerState, StorageConfig, StorageError, Store, TournamentSnapshot};
use crate::models::{
    Enrollment, Game, GameId, GameResult, Player, PlayerId, Tournament, TournamentId,
    TournamentStatus,
};

/// Entity types for JSONL storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Player,
    Tournament,
    Enrollment,
    Game,
}

impl EntityType {
    /// Get the filename for this entity type.
    pub fn filename(&self) -> &'static str {
        match self {
            EntityType::Player => "players.jsonl",
            EntityType::Tournament => "tournaments.jsonl",
            EntityType::Enrollment => "enrollments.jsonl",
            EntityType::Game => "games.jsonl",
        }
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    /// Create a new JSONL writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a writer for a specific entity type.
    pub fn for_entity(config: &StorageConfig, entity: EntityType) -> Self {
        Self::new(config.path_for(entity))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single entity to the file.
    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entity)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }

    /// Write entities, replacing the entire file.
    ///
    /// The new content is written beside the target and renamed over it.
    pub fn write_all(&self, entities: &[T]) -> Result<usize, StorageError> {
        self.ensure_dir()?;

        let tmp_path = self.path.with_extension("jsonl.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        let mut count = 0;

        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }

        writer.flush()?;
        writer.get_ref().sync_data()?;
        fs::rename(&tmp_path, &self.path)?;

        debug!("Wrote {} entities to {:?}", count, self.path);
        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    /// Create a new JSONL reader for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Create a reader for a specific entity type.
    pub fn for_entity(config: &StorageConfig, entity: EntityType) -> Self {
        Self::new(config.path_for(entity))
    }

    /// Check if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read all entities from the file, skipping lines that fail to parse.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        line_num, self.path, e
                    );
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// File-backed ledger.
///
/// The whole ledger is held in memory. A mutation runs against a copy of
/// the state, is written to disk, and only then replaces the live state,
/// so a failed write leaves readers on the previous state.
pub struct JsonlStore {
    config: StorageConfig,
    state: RwLock<LedgerState>,
}

impl JsonlStore {
    /// Load the ledger from `config.ledger_dir()`, creating nothing until
    /// the first write.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        let players: Vec<Player> = JsonlReader::for_entity(&config, EntityType::Player).read_all()?;
        let tournaments: Vec<Tournament> =
            JsonlReader::for_entity(&config, EntityType::Tournament).read_all()?;
        let enrollments: Vec<Enrollment> =
            JsonlReader::for_entity(&config, EntityType::Enrollment).read_all()?;
        let games: Vec<Game> = JsonlReader::for_entity(&config, EntityType::Game).read_all()?;

        info!(
            "Loaded ledger from {:?}: {} players, {} tournaments, {} games",
            config.ledger_dir(),
            players.len(),
            tournaments.len(),
            games.len()
        );

        let state = LedgerState::from_parts(players, tournaments, enrollments, games);
        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> Result<R, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(&state))
    }

    fn mutate<R>(
        &self,
        apply: impl FnOnce(&mut LedgerState) -> Result<R, StorageError>,
        persist: impl FnOnce(&StorageConfig, &LedgerState, &R) -> Result<(), StorageError>,
    ) -> Result<R, StorageError> {
        let mut guard = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        persist(&self.config, &next, &out)?;
        *guard = next;
        Ok(out)
    }
}

fn write_players(config: &StorageConfig, state: &LedgerState) -> Result<(), StorageError> {
    JsonlWriter::for_entity(config, EntityType::Player).write_all(&state.players())?;
    Ok(())
}

fn write_games(config: &StorageConfig, state: &LedgerState) -> Result<(), StorageError> {
    JsonlWriter::for_entity(config, EntityType::Game).write_all(state.games())?;
    Ok(())
}

fn write_tournaments(config: &StorageConfig, state: &LedgerState) -> Result<(), StorageError> {
    JsonlWriter::for_entity(config, EntityType::Tournament).write_all(&state.tournaments())?;
    Ok(())
}

impl Store for JsonlStore {
    fn insert_player(&self, player: Player) -> Result<(), StorageError> {
        self.mutate(|s| s.insert_player(player), |c, s, _| write_players(c, s))
    }

    fn player(&self, id: &PlayerId) -> Result<Option<Player>, StorageError> {
        self.read(|s| s.player(id).cloned())
    }

    fn set_player_active(&self, id: &PlayerId, active: bool) -> Result<Player, StorageError> {
        self.mutate(
            |s| s.set_player_active(id, active),
            |c, s, _| write_players(c, s),
        )
    }

    fn insert_tournament(&self, tournament: Tournament) -> Result<(), StorageError> {
        self.mutate(
            |s| s.insert_tournament(tournament),
            |c, s, _| write_tournaments(c, s),
        )
    }

    fn tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StorageError> {
        self.read(|s| s.tournament(id).cloned())
    }

    fn list_tournaments(&self) -> Result<Vec<Tournament>, StorageError> {
        self.read(|s| s.tournaments())
    }

    fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError> {
        let row = enrollment.clone();
        self.mutate(
            |s| s.enroll(enrollment),
            |c, _, _| JsonlWriter::for_entity(c, EntityType::Enrollment).append(&row),
        )
    }

    fn withdraw(
        &self,
        tournament_id: &TournamentId,
        player_id: &PlayerId,
    ) -> Result<(), StorageError> {
        self.mutate(
            |s| s.withdraw(tournament_id, player_id),
            |c, s, _| {
                JsonlWriter::for_entity(c, EntityType::Enrollment).write_all(s.enrollments())?;
                Ok(())
            },
        )
    }

    fn snapshot(&self, id: &TournamentId) -> Result<Option<TournamentSnapshot>, StorageError> {
        self.read(|s| s.snapshot(id))
    }

    fn game(&self, id: &GameId) -> Result<Option<Game>, StorageError> {
        self.read(|s| s.game(id).cloned())
    }

    fn commit_round(
        &self,
        tournament_id: &TournamentId,
        expected_round: u32,
        games: Vec<Game>,
    ) -> Result<Tournament, StorageError> {
        // games.jsonl is rewritten from the committed state so rows left by
        // an earlier failed commit never outlive it.
        self.mutate(
            |s| s.commit_round(tournament_id, expected_round, games),
            |c, s, _| {
                write_games(c, s)?;
                write_tournaments(c, s)
            },
        )
    }

    fn record_result(&self, game_id: &GameId, result: GameResult) -> Result<Game, StorageError> {
        self.mutate(
            |s| s.record_result(game_id, result),
            |c, _, game| JsonlWriter::for_entity(c, EntityType::Game).append(game),
        )
    }

    fn set_status(
        &self,
        tournament_id: &TournamentId,
        status: TournamentStatus,
    ) -> Result<Tournament, StorageError> {
        self.mutate(
            |s| s.set_status(tournament_id, status),
            |c, s, _| write_tournaments(c, s),
        )
    }
}
