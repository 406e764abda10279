use crate::types::{Beatmap, HighScore, Score, User};
use async_trait::async_trait;
use replay_storage::Ruleset;
use sqlx::mysql::MySqlPool;
use tracing::debug;

/// Get a solo score by id
pub async fn get_score(
    executor: impl sqlx::MySqlExecutor<'_>,
    score_id: u64,
) -> Result<Option<Score>, sqlx::Error> {
    sqlx::query_as::<_, Score>(
        r#"
        SELECT id, user_id, beatmap_id, ruleset_id, has_replay
        FROM scores
        WHERE id = ?
        "#,
    )
    .bind(score_id)
    .fetch_optional(executor)
    .await
}

/// Get a legacy high score from the ruleset's high score table
pub async fn get_legacy_score(
    executor: impl sqlx::MySqlExecutor<'_>,
    score_id: u64,
    ruleset: Ruleset,
) -> Result<Option<HighScore>, sqlx::Error> {
    // Table names cannot be bound; they come from a closed set.
    let query = format!(
        r#"
        SELECT
            score_id, beatmap_id, user_id, score, maxcombo, `rank`,
            count50, count100, count300, countmiss, countgeki, countkatu,
            perfect, enabled_mods, date, replay
        FROM `{}`
        WHERE score_id = ?
        "#,
        ruleset.legacy_high_score_table()
    );

    sqlx::query_as::<_, HighScore>(&query)
        .bind(score_id)
        .fetch_optional(executor)
        .await
}

/// Get a user by id
pub async fn get_user(
    executor: impl sqlx::MySqlExecutor<'_>,
    user_id: u32,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT username FROM phpbb_users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Get a beatmap by id
pub async fn get_beatmap(
    executor: impl sqlx::MySqlExecutor<'_>,
    beatmap_id: u32,
) -> Result<Option<Beatmap>, sqlx::Error> {
    sqlx::query_as::<_, Beatmap>("SELECT checksum FROM osu_beatmaps WHERE beatmap_id = ?")
        .bind(beatmap_id)
        .fetch_optional(executor)
        .await
}

/// Get the score format version recorded for a legacy replay, if any
pub async fn get_legacy_score_version(
    executor: impl sqlx::MySqlExecutor<'_>,
    score_id: u64,
    ruleset: Ruleset,
) -> Result<Option<i32>, sqlx::Error> {
    let query = format!(
        "SELECT version FROM `{}` WHERE score_id = ?",
        ruleset.legacy_replay_table()
    );

    let version = sqlx::query_scalar::<_, Option<i32>>(&query)
        .bind(score_id)
        .fetch_optional(executor)
        .await?;

    Ok(version.flatten())
}

/// Typed read access to the rows the replay store depends on
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    async fn score(&self, score_id: u64) -> Result<Option<Score>, sqlx::Error>;

    async fn legacy_score(
        &self,
        score_id: u64,
        ruleset: Ruleset,
    ) -> Result<Option<HighScore>, sqlx::Error>;

    async fn user(&self, user_id: u32) -> Result<Option<User>, sqlx::Error>;

    async fn beatmap(&self, beatmap_id: u32) -> Result<Option<Beatmap>, sqlx::Error>;

    async fn legacy_score_version(
        &self,
        score_id: u64,
        ruleset: Ruleset,
    ) -> Result<Option<i32>, sqlx::Error>;
}

/// [`ScoreRepository`] backed by a MySQL connection pool
#[derive(Clone)]
pub struct MySqlScoreRepository {
    pool: MySqlPool,
}

impl MySqlScoreRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScoreRepository for MySqlScoreRepository {
    async fn score(&self, score_id: u64) -> Result<Option<Score>, sqlx::Error> {
        debug!(score_id, "Looking up score");
        get_score(&self.pool, score_id).await
    }

    async fn legacy_score(
        &self,
        score_id: u64,
        ruleset: Ruleset,
    ) -> Result<Option<HighScore>, sqlx::Error> {
        debug!(score_id, ruleset = %ruleset, "Looking up legacy score");
        get_legacy_score(&self.pool, score_id, ruleset).await
    }

    async fn user(&self, user_id: u32) -> Result<Option<User>, sqlx::Error> {
        get_user(&self.pool, user_id).await
    }

    async fn beatmap(&self, beatmap_id: u32) -> Result<Option<Beatmap>, sqlx::Error> {
        get_beatmap(&self.pool, beatmap_id).await
    }

    async fn legacy_score_version(
        &self,
        score_id: u64,
        ruleset: Ruleset,
    ) -> Result<Option<i32>, sqlx::Error> {
        get_legacy_score_version(&self.pool, score_id, ruleset).await
    }
}
