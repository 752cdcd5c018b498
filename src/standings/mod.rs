//! Standings calculation.
//!
//! Derives points, win/draw/loss counts and the Buchholz tie-break from the
//! terminal games of a tournament, then ranks players by:
//! points, Buchholz, rating (all descending), player id (ascending).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{EnrolledPlayer, Game, GameResult, PlayerId, StandingsRow, TournamentId};

/// Virtual opponent score credited to Buchholz for each bye round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ByeBuchholzPolicy {
    /// The player's own current total
    #[default]
    OwnScore,
    /// Nothing
    Zero,
    /// Median of all enrolled players' current totals
    FieldMedian,
}

impl std::fmt::Display for ByeBuchholzPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByeBuchholzPolicy::OwnScore => write!(f, "own_score"),
            ByeBuchholzPolicy::Zero => write!(f, "zero"),
            ByeBuchholzPolicy::FieldMedian => write!(f, "field_median"),
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    points: f64,
    wins: u32,
    draws: u32,
    losses: u32,
    byes: u32,
    opponents: Vec<PlayerId>,
}

/// Compute ranked standings for the enrolled players.
///
/// Games with an `Unset` result are ignored. Players with no games get an
/// all-zero row.
pub fn compute_standings(
    players: &[EnrolledPlayer],
    games: &[Game],
    policy: ByeBuchholzPolicy,
) -> Vec<StandingsRow> {
    let tallies = tally_games(games);

    let field_median = match policy {
        ByeBuchholzPolicy::FieldMedian => {
            let totals: Vec<f64> = players
                .iter()
                .map(|p| tallies.get(p.id()).map_or(0.0, |t| t.points))
                .collect();
            median(totals)
        }
        _ => 0.0,
    };

    let mut rows: Vec<StandingsRow> = players
        .iter()
        .map(|enrolled| {
            let player = &enrolled.player;
            let mut row = StandingsRow::new(player.id.clone(), player.name.clone(), player.rating);
            if let Some(tally) = tallies.get(&player.id) {
                row.points = tally.points;
                row.wins = tally.wins;
                row.draws = tally.draws;
                row.losses = tally.losses;
                row.byes = tally.byes;
                row.games_played = tally.wins + tally.draws + tally.losses + tally.byes;

                let opponent_sum: f64 = tally
                    .opponents
                    .iter()
                    .map(|opp| tallies.get(opp).map_or(0.0, |t| t.points))
                    .sum();
                let bye_credit = match policy {
                    ByeBuchholzPolicy::OwnScore => tally.points,
                    ByeBuchholzPolicy::Zero => 0.0,
                    ByeBuchholzPolicy::FieldMedian => field_median,
                };
                row.buchholz = opponent_sum + bye_credit * tally.byes as f64;
            }
            row
        })
        .collect();

    rank_rows(&mut rows);
    debug!("Computed standings for {} players", rows.len());
    rows
}

fn tally_games(games: &[Game]) -> HashMap<PlayerId, Tally> {
    let mut tallies: HashMap<PlayerId, Tally> = HashMap::new();

    for game in games.iter().filter(|g| g.is_terminal()) {
        match (&game.black, game.result) {
            (None, _) | (_, GameResult::Bye) => {
                let t = tallies.entry(game.white.clone()).or_default();
                t.points += 1.0;
                t.byes += 1;
            }
            (Some(black), result) => {
                let Some((white_pts, black_pts)) = result.points() else {
                    continue;
                };
                record(&mut tallies, &game.white, black, white_pts);
                record(&mut tallies, black, &game.white, black_pts);
            }
        }
    }

    tallies
}

fn record(tallies: &mut HashMap<PlayerId, Tally>, player: &PlayerId, opponent: &PlayerId, pts: f64) {
    let t = tallies.entry(player.clone()).or_default();
    t.points += pts;
    t.opponents.push(opponent.clone());
    if pts == 1.0 {
        t.wins += 1;
    } else if pts == 0.5 {
        t.draws += 1;
    } else {
        t.losses += 1;
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Standings order between two rows.
pub fn compare_rows(a: &StandingsRow, b: &StandingsRow) -> Ordering {
    b.points
        .total_cmp(&a.points)
        .then_with(|| b.buchholz.total_cmp(&a.buchholz))
        .then_with(|| b.rating.cmp(&a.rating))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Sort rows into standings order and assign 1-based ranks.
pub fn rank_rows(rows: &mut [StandingsRow]) {
    rows.sort_by(compare_rows);
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as u32 + 1;
    }
}

/// Standings cache keyed by ledger revision.
///
/// An entry is only served while the tournament's revision is unchanged, so
/// any committed round or result forces a recompute.
#[derive(Debug, Default)]
pub struct StandingsCache {
    entries: RwLock<HashMap<TournamentId, (u64, Vec<StandingsRow>)>>,
}

impl StandingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached rows for `tournament_id` at `revision`, if present.
    pub fn get(&self, tournament_id: &TournamentId, revision: u64) -> Option<Vec<StandingsRow>> {
        let entries = self.entries.read().ok()?;
        entries
            .get(tournament_id)
            .filter(|(rev, _)| *rev == revision)
            .map(|(_, rows)| rows.clone())
    }

    pub fn put(&self, tournament_id: &TournamentId, revision: u64, rows: Vec<StandingsRow>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(tournament_id.clone(), (revision, rows));
        }
    }

    pub fn invalidate(&self, tournament_id: &TournamentId) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(tournament_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Player;
    use pretty_assertions::assert_eq;

    fn enrolled(id: &str, rating: u32) -> EnrolledPlayer {
        EnrolledPlayer::new(
            Player::new(PlayerId::from(id), id.to_uppercase(), rating),
            None,
        )
    }

    fn game(round: u32, board: u32, white: &str, black: &str, result: GameResult) -> Game {
        let mut g = Game::new(
            TournamentId::from("t1"),
            round,
            board,
            PlayerId::from(white),
            PlayerId::from(black),
        );
        if result.is_terminal() {
            g.complete(result);
        }
        g
    }

    fn bye(round: u32, player: &str) -> Game {
        Game::bye(TournamentId::from("t1"), round, 99, PlayerId::from(player))
    }

    fn four_players() -> Vec<EnrolledPlayer> {
        vec![
            enrolled("a", 1900),
            enrolled("b", 1800),
            enrolled("c", 1700),
            enrolled("d", 1600),
        ]
    }

    fn order(rows: &[StandingsRow]) -> Vec<&str> {
        rows.iter().map(|r| r.player_id.as_str()).collect()
    }

    #[test]
    fn test_empty_enrollment_gives_empty_table() {
        let rows = compute_standings(&[], &[], ByeBuchholzPolicy::OwnScore);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_no_games_orders_by_rating() {
        let rows = compute_standings(&four_players(), &[], ByeBuchholzPolicy::OwnScore);
        assert_eq!(order(&rows), vec!["a", "b", "c", "d"]);
        assert_eq!(rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(rows.iter().all(|r| r.points == 0.0 && r.games_played == 0));
    }

    #[test]
    fn test_round_one_scenario() {
        let games = vec![
            game(1, 1, "a", "c", GameResult::White),
            game(1, 2, "b", "d", GameResult::Draw),
        ];
        let rows = compute_standings(&four_players(), &games, ByeBuchholzPolicy::OwnScore);

        assert_eq!(order(&rows), vec!["a", "b", "d", "c"]);
        let points: Vec<f64> = rows.iter().map(|r| r.points).collect();
        assert_eq!(points, vec![1.0, 0.5, 0.5, 0.0]);

        let a = &rows[0];
        assert_eq!((a.wins, a.draws, a.losses, a.games_played), (1, 0, 0, 1));
        assert_eq!(a.buchholz, 0.0);
        // B and D tie on points and Buchholz; B is higher rated
        assert_eq!(rows[1].buchholz, 0.5);
        assert_eq!(rows[2].buchholz, 0.5);
        assert_eq!(rows[3].buchholz, 1.0);
        assert_eq!(rows[3].losses, 1);
    }

    #[test]
    fn test_unset_games_are_ignored() {
        let games = vec![
            game(1, 1, "a", "c", GameResult::White),
            game(1, 2, "b", "d", GameResult::Unset),
        ];
        let rows = compute_standings(&four_players(), &games, ByeBuchholzPolicy::OwnScore);
        let b = rows.iter().find(|r| r.player_id.as_str() == "b").unwrap();
        assert_eq!(b.games_played, 0);
        assert_eq!(b.points, 0.0);
    }

    #[test]
    fn test_buchholz_breaks_points_tie() {
        // a, b and d all on 1 point; a beat d (who later won), b beat c (who lost again)
        let games = vec![
            game(1, 1, "a", "d", GameResult::White),
            game(1, 2, "b", "c", GameResult::White),
            game(2, 1, "d", "c", GameResult::White),
            game(2, 2, "a", "b", GameResult::Unset),
        ];
        let rows = compute_standings(&four_players(), &games, ByeBuchholzPolicy::OwnScore);
        // a and d share Buchholz 1.0, a is higher rated; b trails on Buchholz 0.0
        assert_eq!(order(&rows), vec!["a", "d", "b", "c"]);
        assert_eq!(rows[0].buchholz, 1.0);
        assert_eq!(rows[1].buchholz, 1.0);
        assert_eq!(rows[2].buchholz, 0.0);
        assert_eq!(rows[3].buchholz, 2.0);
    }

    #[test]
    fn test_player_id_breaks_full_tie() {
        let players = vec![enrolled("zed", 1500), enrolled("amy", 1500)];
        let rows = compute_standings(&players, &[], ByeBuchholzPolicy::OwnScore);
        assert_eq!(order(&rows), vec!["amy", "zed"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn test_bye_scores_point_and_own_score_buchholz() {
        let mut players = four_players();
        players.push(enrolled("e", 1500));
        let games = vec![
            game(1, 1, "a", "c", GameResult::White),
            game(1, 2, "b", "d", GameResult::Black),
            bye(1, "e"),
        ];
        let rows = compute_standings(&players, &games, ByeBuchholzPolicy::OwnScore);
        let e = rows.iter().find(|r| r.player_id.as_str() == "e").unwrap();
        assert_eq!(e.points, 1.0);
        assert_eq!(e.byes, 1);
        assert_eq!(e.wins, 0);
        assert_eq!(e.games_played, 1);
        assert_eq!(e.buchholz, 1.0);
    }

    #[test]
    fn test_bye_policy_zero_and_median() {
        let mut players = four_players();
        players.push(enrolled("e", 1500));
        let games = vec![
            game(1, 1, "a", "c", GameResult::White),
            game(1, 2, "b", "d", GameResult::Draw),
            bye(1, "e"),
        ];

        let rows = compute_standings(&players, &games, ByeBuchholzPolicy::Zero);
        let e = rows.iter().find(|r| r.player_id.as_str() == "e").unwrap();
        assert_eq!(e.buchholz, 0.0);

        // Totals: a 1, b 0.5, c 0, d 0.5, e 1 → median 0.5
        let rows = compute_standings(&players, &games, ByeBuchholzPolicy::FieldMedian);
        let e = rows.iter().find(|r| r.player_id.as_str() == "e").unwrap();
        assert_eq!(e.buchholz, 0.5);
    }

    #[test]
    fn test_standings_deterministic() {
        let games = vec![
            game(1, 1, "a", "c", GameResult::Draw),
            game(1, 2, "b", "d", GameResult::Draw),
        ];
        let first = compute_standings(&four_players(), &games, ByeBuchholzPolicy::OwnScore);
        let mut reversed_players = four_players();
        reversed_players.reverse();
        let mut reversed_games = games.clone();
        reversed_games.reverse();
        let second =
            compute_standings(&reversed_players, &reversed_games, ByeBuchholzPolicy::OwnScore);
        assert_eq!(first, second);
    }

    #[test]
    fn test_points_conservation() {
        let games = vec![
            game(1, 1, "a", "c", GameResult::Black),
            game(1, 2, "b", "d", GameResult::Draw),
            game(2, 1, "c", "b", GameResult::White),
            game(2, 2, "d", "a", GameResult::Draw),
        ];
        let rows = compute_standings(&four_players(), &games, ByeBuchholzPolicy::OwnScore);
        let total: f64 = rows.iter().map(|r| r.points).sum();
        assert_eq!(total, games.len() as f64);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(vec![]), 0.0);
        assert_eq!(median(vec![2.0, 0.0, 1.0]), 1.0);
        assert_eq!(median(vec![0.0, 1.0, 1.5, 3.0]), 1.25);
    }

    #[test]
    fn test_cache_respects_revision() {
        let cache = StandingsCache::new();
        let id = TournamentId::from("t1");
        let rows = compute_standings(&four_players(), &[], ByeBuchholzPolicy::OwnScore);

        assert!(cache.get(&id, 1).is_none());
        cache.put(&id, 1, rows.clone());
        assert_eq!(cache.get(&id, 1), Some(rows));
        assert!(cache.get(&id, 2).is_none());

        cache.invalidate(&id);
        assert!(cache.get(&id, 1).is_none());
    }

    #[test]
    fn test_policy_serialization() {
        let json = serde_json::to_string(&ByeBuchholzPolicy::FieldMedian).unwrap();
        assert_eq!(json, "\"field_median\"");
        assert_eq!(ByeBuchholzPolicy::default(), ByeBuchholzPolicy::OwnScore);
    }
}
