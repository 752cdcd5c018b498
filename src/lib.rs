//! # Swiss Pairing
//!
//! Pairing and standings engine for chess club tournaments.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, tournaments, games, standings rows)
//! - **storage**: Game ledger (in-memory or JSON Lines on disk)
//! - **standings**: Points, Buchholz and ranking
//! - **pairing**: Swiss pairing with colors and byes
//! - **rounds**: Round lifecycle and result entry
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod config;
pub mod models;
pub mod pairing;
pub mod rounds;
pub mod standings;
pub mod storage;

pub use models::*;
