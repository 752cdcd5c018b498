//! Game model: one board of one round.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, GameId, PlayerId, TournamentId};

/// Piece color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

/// Outcome of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// Not yet played or not yet entered
    #[default]
    Unset,
    White,
    Black,
    Draw,
    /// Unopposed round, scored as a full point
    Bye,
}

impl GameResult {
    /// Any result other than `Unset` is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameResult::Unset)
    }

    /// Points awarded as (white, black). `None` while unset.
    pub fn points(&self) -> Option<(f64, f64)> {
        match self {
            GameResult::Unset => None,
            GameResult::White => Some((1.0, 0.0)),
            GameResult::Black => Some((0.0, 1.0)),
            GameResult::Draw => Some((0.5, 0.5)),
            GameResult::Bye => Some((1.0, 0.0)),
        }
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameResult::Unset => write!(f, "unset"),
            GameResult::White => write!(f, "white"),
            GameResult::Black => write!(f, "black"),
            GameResult::Draw => write!(f, "draw"),
            GameResult::Bye => write!(f, "bye"),
        }
    }
}

impl std::str::FromStr for GameResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unset" => Ok(GameResult::Unset),
            "white" | "1-0" => Ok(GameResult::White),
            "black" | "0-1" => Ok(GameResult::Black),
            "draw" | "1/2-1/2" | "½-½" => Ok(GameResult::Draw),
            "bye" => Ok(GameResult::Bye),
            other => Err(format!("unknown game result: {}", other)),
        }
    }
}

/// A single pairing in a round. `black == None` marks a bye.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Unique identifier (derived from tournament + round + board)
    pub id: GameId,

    pub tournament_id: TournamentId,

    /// Round number (1-based)
    pub round: u32,

    /// Display ordering within the round
    pub board: u32,

    pub white: PlayerId,

    pub black: Option<PlayerId>,

    pub result: GameResult,

    /// When this record was created
    pub created_at: DateTime<Utc>,

    /// When the result became terminal
    pub completed_at: Option<DateTime<Utc>>,
}

impl Game {
    /// Create a new unplayed game.
    pub fn new(
        tournament_id: TournamentId,
        round: u32,
        board: u32,
        white: PlayerId,
        black: PlayerId,
    ) -> Self {
        let id = Self::id_for(&tournament_id, round, board);
        Self {
            id,
            tournament_id,
            round,
            board,
            white,
            black: Some(black),
            result: GameResult::Unset,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Create a bye game; its result is final on creation.
    pub fn bye(tournament_id: TournamentId, round: u32, board: u32, player: PlayerId) -> Self {
        let id = Self::id_for(&tournament_id, round, board);
        let now = Utc::now();
        Self {
            id,
            tournament_id,
            round,
            board,
            white: player,
            black: None,
            result: GameResult::Bye,
            created_at: now,
            completed_at: Some(now),
        }
    }

    fn id_for(tournament_id: &TournamentId, round: u32, board: u32) -> GameId {
        EntityId::generate(&[
            tournament_id.as_str(),
            &round.to_string(),
            &board.to_string(),
        ])
    }

    pub fn is_bye(&self) -> bool {
        self.black.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.result.is_terminal()
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        &self.white == player || self.black.as_ref() == Some(player)
    }

    /// The other player in this game, if `player` took part and it wasn't a bye.
    pub fn opponent_of(&self, player: &PlayerId) -> Option<&PlayerId> {
        let black = self.black.as_ref()?;
        if &self.white == player {
            Some(black)
        } else if black == player {
            Some(&self.white)
        } else {
            None
        }
    }

    /// Color played by `player`; byes have no color.
    pub fn color_of(&self, player: &PlayerId) -> Option<Color> {
        let black = self.black.as_ref()?;
        if &self.white == player {
            Some(Color::White)
        } else if black == player {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Points scored by `player` in this game, once terminal.
    pub fn points_for(&self, player: &PlayerId) -> Option<f64> {
        let (white, black) = self.result.points()?;
        if &self.white == player {
            Some(white)
        } else if self.black.as_ref() == Some(player) {
            Some(black)
        } else {
            None
        }
    }

    /// Record a terminal result.
    pub fn complete(&mut self, result: GameResult) {
        self.result = result;
        self.completed_at = Some(Utc::now());
    }
}
