//! HTTP server for the replay endpoints
//!
//! Provides /health and the /replays routes.

use crate::replays;
use crate::state::SharedState;
use crate::types::HealthResponse;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const MAX_REPLAY_SIZE: usize = 64 * 1024 * 1024;

/// Create the HTTP router
pub fn create_router(state: SharedState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/replays/{score_id}",
            put(replays::put_replay)
                .get(replays::get_replay)
                .delete(replays::delete_replay),
        )
        .route(
            "/replays/{ruleset_id}/{score_id}",
            put(replays::put_legacy_replay)
                .get(replays::get_legacy_replay)
                .delete(replays::delete_legacy_replay),
        )
        .layer(DefaultBodyLimit::max(MAX_REPLAY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests
pub async fn start_server(
    state: SharedState,
    port: u16,
    request_timeout: Duration,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let router = create_router(state, request_timeout);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache_strategy: state.cache_strategy,
        reconcile: state.reconcile.as_ref().map(|stats| stats.snapshot()),
    })
}
