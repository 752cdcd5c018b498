//! Next-round pairing.
//!
//! A `PairingStrategy` turns a ranked list of active players plus the
//! pairing history into a `RoundPlan`. Strategies are pure: they never touch
//! storage, so each one is testable on its own. The round controller picks a
//! strategy by tournament format, checks the plan, and turns it into games.

pub mod colors;
pub mod history;
mod matching;
pub mod swiss;

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::models::{
    EnrolledPlayer, Game, PlayerId, StandingsRow, TournamentFormat, TournamentId,
};

pub use history::PairingHistory;
pub use swiss::SwissPairing;

/// Errors that can occur while pairing a round.
#[derive(Debug, Error, PartialEq)]
pub enum PairingError {
    #[error("No valid pairing exists: {0}")]
    Impossible(String),

    #[error("Pairing invariant violated: {0}")]
    InternalInconsistency(String),

    #[error("No pairing strategy for format {0}")]
    UnsupportedFormat(TournamentFormat),
}

/// Tuning knobs for the pairing search.
#[derive(Debug, Clone)]
pub struct PairingOptions {
    /// Upper bound on preferred-order search steps before settling for
    /// any rematch-free matching
    pub max_search_steps: u64,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            max_search_steps: 200_000,
        }
    }
}

/// A player as seen by the pairing search, in standings order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlayer {
    pub id: PlayerId,
    pub rating: u32,
    pub points: f64,
}

impl RankedPlayer {
    pub fn new(id: PlayerId, rating: u32, points: f64) -> Self {
        Self { id, rating, points }
    }
}

/// One proposed board with colors assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedPairing {
    pub white: PlayerId,
    pub black: PlayerId,
}

impl ProposedPairing {
    pub fn new(white: PlayerId, black: PlayerId) -> Self {
        Self { white, black }
    }
}

/// The outcome of pairing one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundPlan {
    /// Pairings in search order (highest-ranked first)
    pub pairings: Vec<ProposedPairing>,
    pub bye: Option<PlayerId>,
}

/// A pairing algorithm for one tournament format.
pub trait PairingStrategy: Send + Sync {
    /// Strategy identifier for logging.
    fn name(&self) -> &'static str;

    /// Pair `ranked` (standings order) for the next round.
    fn pair(
        &self,
        ranked: &[RankedPlayer],
        history: &PairingHistory,
        options: &PairingOptions,
    ) -> Result<RoundPlan, PairingError>;
}

/// Select the strategy for a tournament format.
pub fn strategy_for(format: TournamentFormat) -> Result<Box<dyn PairingStrategy>, PairingError> {
    match format {
        TournamentFormat::Swiss => Ok(Box::new(SwissPairing)),
        other => Err(PairingError::UnsupportedFormat(other)),
    }
}

/// Order the active players for pairing.
///
/// Round one uses seed (seeded players first, ascending), then rating
/// descending, then id. Later rounds follow the standings table.
pub fn order_for_round(
    players: &[EnrolledPlayer],
    standings: &[StandingsRow],
    first_round: bool,
) -> Vec<RankedPlayer> {
    if first_round {
        let mut active: Vec<&EnrolledPlayer> =
            players.iter().filter(|p| p.player.active).collect();
        active.sort_by(|a, b| {
            let seed_a = a.seed.unwrap_or(u32::MAX);
            let seed_b = b.seed.unwrap_or(u32::MAX);
            seed_a
                .cmp(&seed_b)
                .then_with(|| b.player.rating.cmp(&a.player.rating))
                .then_with(|| a.player.id.cmp(&b.player.id))
        });
        return active
            .into_iter()
            .map(|p| RankedPlayer::new(p.player.id.clone(), p.player.rating, 0.0))
            .collect();
    }

    let active: HashSet<&PlayerId> = players
        .iter()
        .filter(|p| p.player.active)
        .map(|p| p.id())
        .collect();

    standings
        .iter()
        .filter(|row| active.contains(&row.player_id))
        .map(|row| RankedPlayer::new(row.player_id.clone(), row.rating, row.points))
        .collect()
}

/// Check a plan against the round invariants.
///
/// Every ranked player appears exactly once, a bye only exists on an odd
/// field, and no pairing repeats an earlier game.
pub fn validate_plan(
    ranked: &[RankedPlayer],
    history: &PairingHistory,
    plan: &RoundPlan,
) -> Result<(), PairingError> {
    let odd = ranked.len() % 2 == 1;
    match (&plan.bye, odd) {
        (Some(bye), false) => {
            return Err(PairingError::InternalInconsistency(format!(
                "bye issued to {} on an even field of {}",
                bye,
                ranked.len()
            )));
        }
        (None, true) => {
            return Err(PairingError::InternalInconsistency(format!(
                "no bye issued on an odd field of {}",
                ranked.len()
            )));
        }
        _ => {}
    }

    let mut seen: HashSet<&PlayerId> = HashSet::new();
    for pairing in &plan.pairings {
        if pairing.white == pairing.black {
            return Err(PairingError::InternalInconsistency(format!(
                "{} paired against themselves",
                pairing.white
            )));
        }
        if history.has_played(&pairing.white, &pairing.black) {
            return Err(PairingError::InternalInconsistency(format!(
                "rematch between {} and {}",
                pairing.white, pairing.black
            )));
        }
        for player in [&pairing.white, &pairing.black] {
            if !seen.insert(player) {
                return Err(PairingError::InternalInconsistency(format!(
                    "{} paired twice in one round",
                    player
                )));
            }
        }
    }
    if let Some(bye) = &plan.bye {
        if !seen.insert(bye) {
            return Err(PairingError::InternalInconsistency(format!(
                "{} has both a bye and a game",
                bye
            )));
        }
    }

    let expected: HashSet<&PlayerId> = ranked.iter().map(|p| &p.id).collect();
    if seen != expected {
        return Err(PairingError::InternalInconsistency(format!(
            "plan covers {} players, expected {}",
            seen.len(),
            expected.len()
        )));
    }

    Ok(())
}

/// Turn a plan into unsaved games for `round`.
///
/// Boards are numbered by combined rating, highest first; ties keep the
/// plan's order. The bye takes the last board.
pub fn build_games(
    tournament_id: &TournamentId,
    round: u32,
    plan: &RoundPlan,
    ranked: &[RankedPlayer],
) -> Vec<Game> {
    let rating_of = |id: &PlayerId| {
        ranked
            .iter()
            .find(|p| &p.id == id)
            .map_or(0, |p| p.rating)
    };

    let mut boards: Vec<(&ProposedPairing, u64)> = plan
        .pairings
        .iter()
        .map(|p| (p, u64::from(rating_of(&p.white)) + u64::from(rating_of(&p.black))))
        .collect();
    boards.sort_by(|a, b| b.1.cmp(&a.1));

    let mut games: Vec<Game> = boards
        .into_iter()
        .enumerate()
        .map(|(i, (pairing, _))| {
            Game::new(
                tournament_id.clone(),
                round,
                i as u32 + 1,
                pairing.white.clone(),
                pairing.black.clone(),
            )
        })
        .collect();

    if let Some(bye) = &plan.bye {
        let board = games.len() as u32 + 1;
        games.push(Game::bye(tournament_id.clone(), round, board, bye.clone()));
    }

    debug!("Built {} games for round {}", games.len(), round);
    games
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Player;

    fn enrolled(id: &str, rating: u32, seed: Option<u32>) -> EnrolledPlayer {
        EnrolledPlayer::new(Player::new(PlayerId::from(id), id.to_string(), rating), seed)
    }

    fn ranked(id: &str, rating: u32) -> RankedPlayer {
        RankedPlayer::new(PlayerId::from(id), rating, 0.0)
    }

    fn pairing(white: &str, black: &str) -> ProposedPairing {
        ProposedPairing::new(PlayerId::from(white), PlayerId::from(black))
    }

    fn ids(ranked: &[RankedPlayer]) -> Vec<&str> {
        ranked.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_strategy_for_formats() {
        assert_eq!(strategy_for(TournamentFormat::Swiss).unwrap().name(), "swiss");
        assert_eq!(
            strategy_for(TournamentFormat::RoundRobin).err(),
            Some(PairingError::UnsupportedFormat(TournamentFormat::RoundRobin))
        );
    }

    #[test]
    fn test_first_round_order_by_seed_then_rating() {
        let players = vec![
            enrolled("low", 1200, None),
            enrolled("high", 2000, None),
            enrolled("seed2", 1500, Some(2)),
            enrolled("seed1", 1400, Some(1)),
        ];
        let order = order_for_round(&players, &[], true);
        assert_eq!(ids(&order), vec!["seed1", "seed2", "high", "low"]);
    }

    #[test]
    fn test_order_skips_inactive_players() {
        let mut players = vec![enrolled("a", 1900, None), enrolled("b", 1800, None)];
        players[1].player.active = false;
        let order = order_for_round(&players, &[], true);
        assert_eq!(ids(&order), vec!["a"]);

        let rows = vec![
            StandingsRow::new(PlayerId::from("b"), "b".to_string(), 1800),
            StandingsRow::new(PlayerId::from("a"), "a".to_string(), 1900),
        ];
        let order = order_for_round(&players, &rows, false);
        assert_eq!(ids(&order), vec!["a"]);
    }

    #[test]
    fn test_later_rounds_follow_standings() {
        let players = vec![enrolled("a", 1900, Some(1)), enrolled("b", 1800, Some(2))];
        let mut b_row = StandingsRow::new(PlayerId::from("b"), "b".to_string(), 1800);
        b_row.points = 1.0;
        let a_row = StandingsRow::new(PlayerId::from("a"), "a".to_string(), 1900);
        let order = order_for_round(&players, &[b_row, a_row], false);
        assert_eq!(ids(&order), vec!["b", "a"]);
        assert_eq!(order[0].points, 1.0);
    }

    #[test]
    fn test_validate_rejects_even_field_bye() {
        let ranked = vec![ranked("a", 1), ranked("b", 1)];
        let plan = RoundPlan {
            pairings: vec![],
            bye: Some(PlayerId::from("a")),
        };
        let err = validate_plan(&ranked, &PairingHistory::new(), &plan).unwrap_err();
        assert!(matches!(err, PairingError::InternalInconsistency(_)));
    }

    #[test]
    fn test_validate_rejects_rematch_and_duplicates() {
        let ranked = vec![ranked("a", 1), ranked("b", 1), ranked("c", 1), ranked("d", 1)];
        let history = PairingHistory::from_games(&[Game::new(
            TournamentId::from("t"),
            1,
            1,
            PlayerId::from("a"),
            PlayerId::from("b"),
        )]);
        let rematch = RoundPlan {
            pairings: vec![pairing("a", "b"), pairing("c", "d")],
            bye: None,
        };
        assert!(validate_plan(&ranked, &history, &rematch).is_err());

        let duplicate = RoundPlan {
            pairings: vec![pairing("a", "c"), pairing("c", "d")],
            bye: None,
        };
        assert!(validate_plan(&ranked, &PairingHistory::new(), &duplicate).is_err());

        let missing = RoundPlan {
            pairings: vec![pairing("a", "c")],
            bye: None,
        };
        assert!(validate_plan(&ranked, &PairingHistory::new(), &missing).is_err());

        let ok = RoundPlan {
            pairings: vec![pairing("a", "c"), pairing("b", "d")],
            bye: None,
        };
        assert!(validate_plan(&ranked, &history, &ok).is_ok());
    }

    #[test]
    fn test_build_games_orders_boards_by_rating() {
        let ranked = vec![
            ranked("a", 1500),
            ranked("b", 2000),
            ranked("c", 1400),
            ranked("d", 2100),
            ranked("e", 1000),
        ];
        let plan = RoundPlan {
            pairings: vec![pairing("a", "c"), pairing("b", "d")],
            bye: Some(PlayerId::from("e")),
        };
        let games = build_games(&TournamentId::from("t"), 2, &plan, &ranked);

        assert_eq!(games.len(), 3);
        assert_eq!(games[0].white.as_str(), "b");
        assert_eq!(games[0].board, 1);
        assert_eq!(games[1].white.as_str(), "a");
        assert_eq!(games[1].board, 2);
        assert!(games[2].is_bye());
        assert_eq!(games[2].board, 3);
        assert!(games.iter().all(|g| g.round == 2));
    }

    #[test]
    fn test_build_games_handles_extreme_ratings() {
        let ranked = vec![
            ranked("a", u32::MAX),
            ranked("b", 3_000_000_000),
            ranked("c", 1200),
            ranked("d", 1100),
        ];
        let plan = RoundPlan {
            pairings: vec![pairing("c", "d"), pairing("a", "b")],
            bye: None,
        };
        let games = build_games(&TournamentId::from("t"), 1, &plan, &ranked);

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].white.as_str(), "a");
        assert_eq!(games[1].white.as_str(), "c");
    }
}
