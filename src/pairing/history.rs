//! Pairing history derived from the game ledger.

use std::collections::{HashMap, HashSet};

use crate::models::{Color, Game, PlayerId};

/// Who has met whom, which colors each player had, and who received byes.
///
/// Every game counts regardless of result: a pairing exists once committed.
#[derive(Debug, Clone, Default)]
pub struct PairingHistory {
    opponents: HashMap<PlayerId, HashSet<PlayerId>>,
    colors: HashMap<PlayerId, Vec<Color>>,
    byes: HashMap<PlayerId, u32>,
}

impl PairingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the history from all games of a tournament.
    pub fn from_games(games: &[Game]) -> Self {
        let mut sorted: Vec<&Game> = games.iter().collect();
        sorted.sort_by_key(|g| (g.round, g.board));

        let mut history = Self::new();
        for game in sorted {
            history.record(game);
        }
        history
    }

    /// Add one game. Games must be recorded in round order for color history.
    pub fn record(&mut self, game: &Game) {
        if game.is_bye() {
            *self.byes.entry(game.white.clone()).or_default() += 1;
            return;
        }
        for player in [Some(&game.white), game.black.as_ref()].into_iter().flatten() {
            if let (Some(opponent), Some(color)) = (game.opponent_of(player), game.color_of(player)) {
                self.opponents
                    .entry(player.clone())
                    .or_default()
                    .insert(opponent.clone());
                self.colors.entry(player.clone()).or_default().push(color);
            }
        }
    }

    /// True if `a` and `b` already met in this tournament.
    pub fn has_played(&self, a: &PlayerId, b: &PlayerId) -> bool {
        self.opponents.get(a).is_some_and(|opps| opps.contains(b))
    }

    pub fn byes_received(&self, player: &PlayerId) -> u32 {
        self.byes.get(player).copied().unwrap_or(0)
    }

    /// Whites minus blacks.
    pub fn color_balance(&self, player: &PlayerId) -> i32 {
        self.colors.get(player).map_or(0, |colors| {
            colors
                .iter()
                .map(|c| match c {
                    Color::White => 1,
                    Color::Black => -1,
                })
                .sum()
        })
    }

    pub fn last_color(&self, player: &PlayerId) -> Option<Color> {
        self.colors.get(player).and_then(|colors| colors.last().copied())
    }
}
