//! Response types for the replay server

use replay_cache::ReconcileSnapshot;
use serde::Serialize;

pub const REPLAY_CONTENT_TYPE: &str = "application/x-osu-replay";
pub const CACHE_HIT_HEADER: &str = "x-cache-hit";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache_strategy: &'static str,
    /// Absent for the dated cache, which has no reconciliation worker
    pub reconcile: Option<ReconcileSnapshot>,
}
