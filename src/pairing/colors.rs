//! Color allocation for a round's pairings.

use std::cmp::Ordering;

use super::history::PairingHistory;
use super::{ProposedPairing, RankedPlayer};
use crate::models::{Color, PlayerId};

/// Assign white/black for each pairing.
///
/// `pairs` holds (higher-ranked, lower-ranked) in board order. A player with
/// fewer net whites gets white; on equal balance the player who last had
/// black gets white. Otherwise the higher-ranked player takes whichever color
/// keeps the round's count of higher-ranked whites and blacks even, starting
/// with white.
pub fn assign_colors(
    pairs: &[(&RankedPlayer, &RankedPlayer)],
    history: &PairingHistory,
) -> Vec<ProposedPairing> {
    let mut higher_white_tally: i32 = 0;

    pairs
        .iter()
        .map(|(higher, lower)| {
            let higher_gets_white = match preference(history, &higher.id, &lower.id) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => higher_white_tally <= 0,
            };
            higher_white_tally += if higher_gets_white { 1 } else { -1 };

            if higher_gets_white {
                ProposedPairing::new(higher.id.clone(), lower.id.clone())
            } else {
                ProposedPairing::new(lower.id.clone(), higher.id.clone())
            }
        })
        .collect()
}

/// `Greater` when `a` is due white over `b`, `Less` when `b` is, `Equal` on identical history.
fn preference(history: &PairingHistory, a: &PlayerId, b: &PlayerId) -> Ordering {
    let balance_a = history.color_balance(a);
    let balance_b = history.color_balance(b);
    balance_b
        .cmp(&balance_a)
        .then_with(|| white_due(history, a).cmp(&white_due(history, b)))
}

fn white_due(history: &PairingHistory, player: &PlayerId) -> i32 {
    match history.last_color(player) {
        Some(Color::Black) => 1,
        None => 0,
        Some(Color::White) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, TournamentId};

    fn ranked(id: &str) -> RankedPlayer {
        RankedPlayer::new(PlayerId::from(id), 1500, 0.0)
    }

    fn game(round: u32, white: &str, black: &str) -> Game {
        Game::new(
            TournamentId::from("t1"),
            round,
            1,
            PlayerId::from(white),
            PlayerId::from(black),
        )
    }

    fn whites(pairings: &[ProposedPairing]) -> Vec<&str> {
        pairings.iter().map(|p| p.white.as_str()).collect()
    }

    #[test]
    fn test_first_round_alternates_by_board() {
        let players: Vec<RankedPlayer> = ["a", "b", "c", "d", "e", "f"].iter().map(|id| ranked(id)).collect();
        let pairs = vec![
            (&players[0], &players[3]),
            (&players[1], &players[4]),
            (&players[2], &players[5]),
        ];
        let result = assign_colors(&pairs, &PairingHistory::new());
        assert_eq!(whites(&result), vec!["a", "e", "c"]);
    }

    #[test]
    fn test_fewer_whites_gets_white() {
        // a had white, b had black last round
        let history = PairingHistory::from_games(&[game(1, "a", "x"), game(1, "y", "b")]);
        let (a, b) = (ranked("a"), ranked("b"));
        let result = assign_colors(&[(&a, &b)], &history);
        assert_eq!(result[0].white.as_str(), "b");
        assert_eq!(result[0].black.as_str(), "a");
    }

    #[test]
    fn test_equal_balance_alternates_from_last_color() {
        // Both balanced at zero; a last played black, b last played white
        let history = PairingHistory::from_games(&[
            game(1, "a", "x"),
            game(1, "y", "b"),
            game(2, "z", "a"),
            game(2, "b", "w"),
        ]);
        let (a, b) = (ranked("a"), ranked("b"));
        let result = assign_colors(&[(&b, &a)], &history);
        assert_eq!(result[0].white.as_str(), "a");
    }

    #[test]
    fn test_bye_history_player_vs_black_player() {
        // b had black, a had no games: b is due white
        let history = PairingHistory::from_games(&[game(1, "y", "b")]);
        let (a, b) = (ranked("a"), ranked("b"));
        let result = assign_colors(&[(&a, &b)], &history);
        assert_eq!(result[0].white.as_str(), "b");
    }

    #[test]
    fn test_deterministic() {
        let players: Vec<RankedPlayer> = ["a", "b", "c", "d"].iter().map(|id| ranked(id)).collect();
        let pairs = vec![(&players[0], &players[2]), (&players[1], &players[3])];
        let first = assign_colors(&pairs, &PairingHistory::new());
        let second = assign_colors(&pairs, &PairingHistory::new());
        assert_eq!(first, second);
    }
}
