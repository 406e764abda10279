//! Local hot cache for replay blobs
//!
//! Two strategies share the [`ReplayCache`] trait:
//!
//! - [`MarkerReplayCache`]: flat files guarded by expiring markers in Redis.
//!   A [`ReconciliationWorker`] fed by a [`KeyspaceSubscription`] deletes the
//!   file once its marker expires or is evicted.
//! - [`DatedReplayCache`]: files bucketed by day, cleaned up by a
//!   [`DatedBucketSweeper`].

mod dated;
pub mod error;
mod event;
mod keyspace;
mod layout;
mod marker;
mod marker_cache;
mod reconcile;

pub use dated::{bucket_name, DatedBucketSweeper, DatedReplayCache};
pub use error::{CacheError, Result};
pub use event::{KeyspaceEvent, MarkerEvent, MarkerEventKind};
pub use keyspace::{channel_name, parse_keyevent, KeyspaceSubscription};
pub use layout::CacheLayout;
pub use marker::{marker_name, parse_marker_name, MarkerStore, MemoryMarkerStore, RedisMarkerStore};
pub use marker_cache::MarkerReplayCache;
pub use reconcile::{ReconcileSnapshot, ReconcileStats, ReconciliationWorker, WorkerState};

use async_trait::async_trait;
use replay_storage::ReplayKey;

/// Fast local copy of recently used replays
#[async_trait]
pub trait ReplayCache: Send + Sync {
    async fn add(&self, key: &ReplayKey, data: &[u8]) -> Result<()>;

    /// Cached bytes, or `None` on a miss
    async fn find(&self, key: &ReplayKey) -> Result<Option<Vec<u8>>>;

    /// Drop the entry. Removing a missing entry succeeds.
    async fn remove(&self, key: &ReplayKey) -> Result<()>;
}
