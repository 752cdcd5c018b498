//! In-process store, used by tests and `--ephemeral` serving.

use std::sync::RwLock;

use super::{LedgerState, Store, StorageError, TournamentSnapshot};
use crate::models::{
    Enrollment, Game, GameId, GameResult, Player, PlayerId, Tournament, TournamentId,
    TournamentStatus,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> Result<R, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(&state))
    }

    fn write<R>(
        &self,
        f: impl FnOnce(&mut LedgerState) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        f(&mut state)
    }
}

impl Store for MemoryStore {
    fn insert_player(&self, player: Player) -> Result<(), StorageError> {
        self.write(|s| s.insert_player(player))
    }

    fn player(&self, id: &PlayerId) -> Result<Option<Player>, StorageError> {
        self.read(|s| s.player(id).cloned())
    }

    fn set_player_active(&self, id: &PlayerId, active: bool) -> Result<Player, StorageError> {
        self.write(|s| s.set_player_active(id, active))
    }

    fn insert_tournament(&self, tournament: Tournament) -> Result<(), StorageError> {
        self.write(|s| s.insert_tournament(tournament))
    }

    fn tournament(&self, id: &TournamentId) -> Result<Option<Tournament>, StorageError> {
        self.read(|s| s.tournament(id).cloned())
    }

    fn list_tournaments(&self) -> Result<Vec<Tournament>, StorageError> {
        self.read(|s| s.tournaments())
    }

    fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError> {
        self.write(|s| s.enroll(enrollment))
    }

    fn withdraw(
        &self,
        tournament_id: &TournamentId,
        player_id: &PlayerId,
    ) -> Result<(), StorageError> {
        self.write(|s| s.withdraw(tournament_id, player_id))
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
        self.write(|s| s.commit_round(tournament_id, expected_round, games))
    }

    fn record_result(&self, game_id: &GameId, result: GameResult) -> Result<Game, StorageError> {
        self.write(|s| s.record_result(game_id, result))
    }

    fn set_status(
        &self,
        tournament_id: &TournamentId,
        status: TournamentStatus,
    ) -> Result<Tournament, StorageError> {
        self.write(|s| s.set_status(tournament_id, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TournamentFormat;
    use std::sync::Arc;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let player = Player::new(PlayerId::from("a"), "Alice".to_string(), 1850);
        store.insert_player(player.clone()).unwrap();
        assert_eq!(store.player(&PlayerId::from("a")).unwrap(), Some(player));
        assert_eq!(store.player(&PlayerId::from("zz")).unwrap(), None);

        let tournament = Tournament::new("Open".to_string(), TournamentFormat::Swiss, 5);
        let id = tournament.id.clone();
        store.insert_tournament(tournament).unwrap();
        assert_eq!(store.list_tournaments().unwrap().len(), 1);
        assert_eq!(store.tournament(&id).unwrap().unwrap().rounds, 5);
    }

    #[test]
    fn test_concurrent_commits_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let tournament = Tournament::new("Blitz".to_string(), TournamentFormat::Swiss, 3)
            .with_id(TournamentId::from("t1"));
        store.insert_tournament(tournament).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.commit_round(&TournamentId::from("t1"), 0, Vec::new())
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(wins, 1);
        let current = store.tournament(&TournamentId::from("t1")).unwrap().unwrap();
        assert_eq!(current.current_round, 1);
    }
}
