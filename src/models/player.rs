//! Player and enrollment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PlayerId, TournamentId};

/// A registered club player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Rating (e.g. 100-3000)
    pub rating: u32,

    /// Inactive players stay in standings but are not paired
    #[serde(default = "default_active")]
    pub active: bool,

    /// When this record was created
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Player {
    /// Create a new active player.
    pub fn new(id: PlayerId, name: String, rating: u32) -> Self {
        Self {
            id,
            name,
            rating,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Builder method to set the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// A player's enrollment in a tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub tournament_id: TournamentId,
    pub player_id: PlayerId,

    /// Only used to order round one
    pub seed: Option<u32>,

    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(tournament_id: TournamentId, player_id: PlayerId, seed: Option<u32>) -> Self {
        Self {
            tournament_id,
            player_id,
            seed,
            enrolled_at: Utc::now(),
        }
    }
}

/// A player joined with their enrollment in one tournament.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledPlayer {
    pub player: Player,
    pub seed: Option<u32>,
}

impl EnrolledPlayer {
    pub fn new(player: Player, seed: Option<u32>) -> Self {
        Self { player, seed }
    }

    pub fn id(&self) -> &PlayerId {
        &self.player.id
    }
}
