//! Replay upload, download and deletion
//!
//! Solo replays are addressed by score id alone; legacy replays by ruleset id
//! and legacy score id. The score row is always consulted first: a missing
//! score, or one without the replay flag set, never reaches either storage
//! tier on reads.

use crate::error::AppError;
use crate::state::SharedState;
use crate::types::{CACHE_HIT_HEADER, REPLAY_CONTENT_TYPE};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderName};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use replay_db::HighScore;
use replay_storage::{ReplayKey, Ruleset};
use tracing::{info, warn};

type Result<T> = std::result::Result<T, AppError>;

/// PUT /replays/{score_id}
pub async fn put_replay(
    State(state): State<SharedState>,
    Path(score_id): Path<u64>,
    body: Bytes,
) -> Result<StatusCode> {
    let score = state.scores.score(score_id).await?.ok_or(AppError::NotFound)?;
    let key = ReplayKey::solo(score_id, stored_ruleset(score.ruleset_id)?);

    state.storage.store(&key, &body).await?;
    add_to_cache(&state, &key, &body).await;

    info!(key = %key, size = body.len(), "Replay uploaded");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /replays/{ruleset_id}/{score_id}
pub async fn put_legacy_replay(
    State(state): State<SharedState>,
    Path((ruleset_id, score_id)): Path<(u16, u64)>,
    body: Bytes,
) -> Result<StatusCode> {
    let ruleset = Ruleset::from_id(ruleset_id)?;
    let score = state
        .scores
        .legacy_score(score_id, ruleset)
        .await?
        .ok_or(AppError::NotFound)?;
    let key = ReplayKey::legacy(score_id, ruleset);

    // Durable copy is the bare frame data; the cache holds what clients receive.
    state.storage.store(&key, &body).await?;
    let full = with_legacy_header(&state, &body, ruleset, &score).await?;
    add_to_cache(&state, &key, &full).await;

    info!(key = %key, size = body.len(), "Legacy replay uploaded");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /replays/{score_id}
pub async fn get_replay(
    State(state): State<SharedState>,
    Path(score_id): Path<u64>,
) -> Result<Response> {
    let score = state.scores.score(score_id).await?.ok_or(AppError::NotFound)?;
    if !score.has_replay {
        return Err(AppError::NotFound);
    }

    let key = ReplayKey::solo(score_id, stored_ruleset(score.ruleset_id)?);
    let file_name = file_name(&key, score.beatmap_id);

    if let Some(data) = find_in_cache(&state, &key).await {
        info!(key = %key, source = "cache", "Replay downloaded");
        return Ok(replay_response(data, &file_name, true));
    }

    let data = state.storage.fetch(&key).await?;

    info!(key = %key, source = "storage", "Replay downloaded");
    Ok(replay_response(data, &file_name, false))
}

/// GET /replays/{ruleset_id}/{score_id}
pub async fn get_legacy_replay(
    State(state): State<SharedState>,
    Path((ruleset_id, score_id)): Path<(u16, u64)>,
) -> Result<Response> {
    let ruleset = Ruleset::from_id(ruleset_id)?;
    let score = state
        .scores
        .legacy_score(score_id, ruleset)
        .await?
        .ok_or(AppError::NotFound)?;
    if !score.replay {
        return Err(AppError::NotFound);
    }

    let key = ReplayKey::legacy(score_id, ruleset);
    let file_name = file_name(&key, score.beatmap_id);

    if let Some(data) = find_in_cache(&state, &key).await {
        info!(key = %key, source = "cache", "Legacy replay downloaded");
        return Ok(replay_response(data, &file_name, true));
    }

    let frames = state.storage.fetch(&key).await?;
    let data = with_legacy_header(&state, &frames, ruleset, &score).await?;

    info!(key = %key, source = "storage", "Legacy replay downloaded");
    Ok(replay_response(data, &file_name, false))
}

/// DELETE /replays/{score_id}
pub async fn delete_replay(
    State(state): State<SharedState>,
    Path(score_id): Path<u64>,
) -> Result<StatusCode> {
    let score = state.scores.score(score_id).await?.ok_or(AppError::NotFound)?;
    if !score.has_replay {
        return Err(AppError::NotFound);
    }

    let key = ReplayKey::solo(score_id, stored_ruleset(score.ruleset_id)?);
    remove_everywhere(&state, &key).await?;

    info!(key = %key, "Replay deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /replays/{ruleset_id}/{score_id}
pub async fn delete_legacy_replay(
    State(state): State<SharedState>,
    Path((ruleset_id, score_id)): Path<(u16, u64)>,
) -> Result<StatusCode> {
    let ruleset = Ruleset::from_id(ruleset_id)?;
    let score = state
        .scores
        .legacy_score(score_id, ruleset)
        .await?
        .ok_or(AppError::NotFound)?;
    if !score.replay {
        return Err(AppError::NotFound);
    }

    let key = ReplayKey::legacy(score_id, ruleset);
    remove_everywhere(&state, &key).await?;

    info!(key = %key, "Legacy replay deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Ruleset of a score row. A bad id here is bad data, not a bad request.
fn stored_ruleset(ruleset_id: u16) -> Result<Ruleset> {
    Ruleset::from_id(ruleset_id)
        .map_err(|e| AppError::Internal(format!("Score row has {}", e)))
}

/// Download name, e.g. `replay-taiko_129891_4501250208.osr`
pub fn file_name(key: &ReplayKey, beatmap_id: u32) -> String {
    let prefix = if key.legacy { "replay" } else { "solo-replay" };
    format!(
        "{}-{}_{}_{}.osr",
        prefix,
        key.ruleset.name(),
        beatmap_id,
        key.score_id
    )
}

fn replay_response(data: Vec<u8>, file_name: &str, from_cache: bool) -> Response {
    let headers = [
        (header::CONTENT_TYPE, REPLAY_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
        (
            HeaderName::from_static(CACHE_HIT_HEADER),
            String::from(if from_cache { "1" } else { "0" }),
        ),
    ];

    (StatusCode::OK, headers, data).into_response()
}

async fn with_legacy_header(
    state: &SharedState,
    frames: &[u8],
    ruleset: Ruleset,
    score: &HighScore,
) -> Result<Vec<u8>> {
    let user = state.scores.user(score.user_id).await?.ok_or_else(|| {
        AppError::Internal(format!(
            "User {} of legacy score {} not found",
            score.user_id, score.score_id
        ))
    })?;
    let beatmap = state.scores.beatmap(score.beatmap_id).await?.ok_or_else(|| {
        AppError::Internal(format!(
            "Beatmap {} of legacy score {} not found",
            score.beatmap_id, score.score_id
        ))
    })?;
    let version = state
        .scores
        .legacy_score_version(score.score_id, ruleset)
        .await?;

    Ok(legacy_replay::build(
        frames,
        ruleset.id() as u8,
        version,
        score,
        &user,
        &beatmap,
    ))
}

/// A failed cache write only costs a future cache miss
async fn add_to_cache(state: &SharedState, key: &ReplayKey, data: &[u8]) {
    if let Err(e) = state.cache.add(key, data).await {
        warn!(key = %key, error = %e, "Failed to cache replay");
    }
}

async fn find_in_cache(state: &SharedState, key: &ReplayKey) -> Option<Vec<u8>> {
    match state.cache.find(key).await {
        Ok(found) => found,
        Err(e) => {
            warn!(key = %key, error = %e, "Cache lookup failed, reading from storage");
            None
        }
    }
}

async fn remove_everywhere(state: &SharedState, key: &ReplayKey) -> Result<()> {
    state.storage.delete(key).await?;
    state.cache.remove(key).await?;
    Ok(())
}
