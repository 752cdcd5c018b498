//! Core data models for the pairing engine.

mod game;
mod ids;
mod player;
mod standings;
mod tournament;

pub use game::*;
pub use ids::*;
pub use player::*;
pub use standings::*;
pub use tournament::*;
