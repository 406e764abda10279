//! Read-only lookups against the score database
//!
//! The replay store never writes to the database. It only needs to know
//! whether a score exists, whether it has a replay, and the metadata that
//! goes into a legacy replay header.

pub mod scores;
pub mod types;

pub use scores::{MySqlScoreRepository, ScoreRepository};
pub use sqlx::mysql::MySqlPool;
pub use types::*;
