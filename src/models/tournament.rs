//! Tournament model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, TournamentId};

/// Competition format. Only Swiss has a pairing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    #[default]
    Swiss,
    RoundRobin,
    SingleElimination,
    DoubleElimination,
}

impl std::fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentFormat::Swiss => write!(f, "swiss"),
            TournamentFormat::RoundRobin => write!(f, "round_robin"),
            TournamentFormat::SingleElimination => write!(f, "single_elimination"),
            TournamentFormat::DoubleElimination => write!(f, "double_elimination"),
        }
    }
}

impl std::str::FromStr for TournamentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "swiss" => Ok(TournamentFormat::Swiss),
            "round_robin" => Ok(TournamentFormat::RoundRobin),
            "single_elimination" => Ok(TournamentFormat::SingleElimination),
            "double_elimination" => Ok(TournamentFormat::DoubleElimination),
            other => Err(format!("unknown tournament format: {}", other)),
        }
    }
}

/// Lifecycle status of a tournament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    #[default]
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    /// Completed and cancelled tournaments accept no further rounds or results.
    pub fn is_closed(&self) -> bool {
        matches!(self, TournamentStatus::Completed | TournamentStatus::Cancelled)
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentStatus::Upcoming => write!(f, "upcoming"),
            TournamentStatus::Ongoing => write!(f, "ongoing"),
            TournamentStatus::Completed => write!(f, "completed"),
            TournamentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Inclusive rating range a player must fall in to enroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingBand {
    pub min_rating: u32,
    pub max_rating: u32,
}

impl RatingBand {
    pub fn new(min_rating: u32, max_rating: u32) -> Self {
        Self {
            min_rating,
            max_rating,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_rating <= self.max_rating
    }

    pub fn contains(&self, rating: u32) -> bool {
        rating >= self.min_rating && rating <= self.max_rating
    }
}

/// A round-based competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    /// Unique identifier
    pub id: TournamentId,

    /// Display name
    pub name: String,

    /// Pairing format
    pub format: TournamentFormat,

    /// Configured number of rounds
    pub rounds: u32,

    /// Last committed round (0 = not started)
    pub current_round: u32,

    pub status: TournamentStatus,

    /// Optional enrollment rating band
    pub rating_band: Option<RatingBand>,

    /// When this record was created
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    /// Create a new upcoming tournament with a random ID.
    pub fn new(name: String, format: TournamentFormat, rounds: u32) -> Self {
        Self {
            id: EntityId::random(),
            name,
            format,
            rounds,
            current_round: 0,
            status: TournamentStatus::Upcoming,
            rating_band: None,
            created_at: Utc::now(),
        }
    }

    /// Builder method to set an explicit ID.
    pub fn with_id(mut self, id: TournamentId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the rating band.
    pub fn with_rating_band(mut self, band: RatingBand) -> Self {
        self.rating_band = Some(band);
        self
    }

    /// True once round one has been committed.
    pub fn has_started(&self) -> bool {
        self.current_round > 0
    }

    /// True while fewer than the configured rounds have been committed.
    pub fn has_rounds_remaining(&self) -> bool {
        self.current_round < self.rounds
    }

    /// Whether a player with `rating` may enroll.
    pub fn accepts_rating(&self, rating: u32) -> bool {
        self.rating_band.map_or(true, |band| band.contains(rating))
    }
}
