//! Derived standings rows.

use serde::{Deserialize, Serialize};

use super::PlayerId;

/// One player's line in the standings table. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    /// 1-based, unique within a table
    pub rank: u32,
    pub player_id: PlayerId,
    pub player_name: String,
    pub rating: u32,
    pub points: f64,
    /// Includes byes
    pub games_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub byes: u32,
    pub buchholz: f64,
}

impl StandingsRow {
    /// Empty row for a player with no terminal games.
    pub fn new(player_id: PlayerId, player_name: String, rating: u32) -> Self {
        Self {
            rank: 0,
            player_id,
            player_name,
            rating,
            points: 0.0,
            games_played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            byes: 0,
            buchholz: 0.0,
        }
    }
}
