use chrono::{DateTime, Utc};
use replay_cache::{ReconcileStats, ReplayCache};
use replay_db::ScoreRepository;
use replay_storage::ReplayStorage;
use std::sync::Arc;

/// Shared application state passed to all route handlers
pub struct AppState {
    pub storage: Arc<dyn ReplayStorage>,
    pub cache: Arc<dyn ReplayCache>,
    pub scores: Arc<dyn ScoreRepository>,
    /// `marker` or `dated`
    pub cache_strategy: &'static str,
    /// Present when the marker cache runs a reconciliation worker
    pub reconcile: Option<Arc<ReconcileStats>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn ReplayStorage>,
        cache: Arc<dyn ReplayCache>,
        scores: Arc<dyn ScoreRepository>,
        cache_strategy: &'static str,
    ) -> Self {
        Self {
            storage,
            cache,
            scores,
            cache_strategy,
            reconcile: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_reconcile_stats(mut self, stats: Arc<ReconcileStats>) -> Self {
        self.reconcile = Some(stats);
        self
    }
}

pub type SharedState = Arc<AppState>;
