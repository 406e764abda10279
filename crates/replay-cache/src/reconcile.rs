//! Deletes cached files whose markers went away
//!
//! The worker consumes [`KeyspaceEvent`]s and purges the matching file from
//! the marker cache. It never polls the durable store and takes no locks; a
//! missed event only leaves an unreachable file behind, since lookups require
//! a live marker.

use crate::error::Result;
use crate::event::{KeyspaceEvent, MarkerEvent};
use crate::marker::parse_marker_name;
use crate::marker_cache::MarkerReplayCache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Subscribed,
    Reconciling,
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Subscribed,
            2 => WorkerState::Reconciling,
            3 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

/// Counters shared between the worker and whoever reports on it
#[derive(Debug, Default)]
pub struct ReconcileStats {
    state: AtomicU8,
    events: AtomicU64,
    purged: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`ReconcileStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSnapshot {
    pub state: WorkerState,
    /// Marker events received
    pub events: u64,
    /// Cached files deleted
    pub purged: u64,
    /// Events for markers that are live again by the time they are handled
    pub skipped: u64,
    pub errors: u64,
}

impl ReconcileStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReconcileSnapshot {
        ReconcileSnapshot {
            state: self.state(),
            events: self.events.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

enum Outcome {
    Purged,
    /// Marker is gone but there was no file to delete
    AlreadyGone,
    Skipped,
}

pub struct ReconciliationWorker {
    cache: Arc<MarkerReplayCache>,
    stats: Arc<ReconcileStats>,
    heartbeat: Duration,
}

impl ReconciliationWorker {
    pub fn new(cache: Arc<MarkerReplayCache>, stats: Arc<ReconcileStats>) -> Self {
        Self {
            cache,
            stats,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Process events until `shutdown` fires or every sender is dropped
    pub async fn run(self, mut events: mpsc::Receiver<KeyspaceEvent>, shutdown: CancellationToken) {
        let mut heartbeat = tokio::time::interval(self.heartbeat);
        info!("Reconciliation worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Reconciliation worker shutting down");
                    break;
                }
                _ = heartbeat.tick() => {
                    let stats = self.stats.snapshot();
                    debug!(
                        state = ?stats.state,
                        events = stats.events,
                        purged = stats.purged,
                        errors = stats.errors,
                        "Reconciliation heartbeat"
                    );
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        warn!("Keyspace event channel closed");
                        break;
                    };
                    self.handle(event).await;
                }
            }
        }

        self.stats.set_state(WorkerState::Stopped);
    }

    async fn handle(&self, event: KeyspaceEvent) {
        match event {
            KeyspaceEvent::Connected => {
                info!("Subscribed to marker keyevents");
                self.stats.set_state(WorkerState::Subscribed);
            }
            KeyspaceEvent::Disconnected => {
                warn!("Marker keyevent subscription lost");
                self.stats.set_state(WorkerState::Idle);
            }
            KeyspaceEvent::Error(e) => {
                error!("Keyspace subscription error: {}", e);
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
            }
            KeyspaceEvent::Marker(event) => {
                self.stats.events.fetch_add(1, Ordering::Relaxed);
                let previous = self.stats.state();
                self.stats.set_state(WorkerState::Reconciling);

                match self.reconcile(&event).await {
                    Ok(Outcome::Purged) => {
                        self.stats.purged.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Outcome::AlreadyGone) => {}
                    Ok(Outcome::Skipped) => {
                        self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        error!(marker = %event.marker, kind = event.kind.as_str(), "Reconciliation failed: {}", e);
                        self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    }
                }

                self.stats.set_state(previous);
            }
        }
    }

    async fn reconcile(&self, event: &MarkerEvent) -> Result<Outcome> {
        let key = parse_marker_name(&event.marker)?;

        // SET with EX reports `expire` for a marker that was just created, and
        // reaps a lapsed marker lazily, so `expired` can trail a fresh add.
        if self.cache.marker_exists(&key).await? {
            debug!(key = %key, kind = event.kind.as_str(), "Marker still live, nothing to purge");
            return Ok(Outcome::Skipped);
        }

        if self.cache.purge(&key).await? {
            Ok(Outcome::Purged)
        } else {
            debug!(key = %key, kind = event.kind.as_str(), "No cached file for vanished marker");
            Ok(Outcome::AlreadyGone)
        }
    }
}
