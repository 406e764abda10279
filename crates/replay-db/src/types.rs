use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Solo score row from `scores`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Score {
    pub id: u64,
    pub user_id: u32,
    pub beatmap_id: u32,
    pub ruleset_id: u16,
    pub has_replay: bool,
}

/// Legacy high score row from `osu_scores{_ruleset}_high`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HighScore {
    pub score_id: u64,
    pub beatmap_id: u32,
    pub user_id: u32,
    pub score: i32,
    #[sqlx(rename = "maxcombo")]
    pub max_combo: u16,
    pub rank: String,
    pub count50: u16,
    pub count100: u16,
    pub count300: u16,
    #[sqlx(rename = "countmiss")]
    pub count_miss: u16,
    #[sqlx(rename = "countgeki")]
    pub count_geki: u16,
    #[sqlx(rename = "countkatu")]
    pub count_katu: u16,
    pub perfect: bool,
    pub enabled_mods: i32,
    pub date: DateTime<Utc>,
    /// Whether a replay was ever recorded for this score
    pub replay: bool,
}

/// User row from `phpbb_users`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub username: String,
}

/// Beatmap row from `osu_beatmaps`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Beatmap {
    pub checksum: String,
}
