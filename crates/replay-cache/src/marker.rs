//! Expiring existence markers for cached replays
//!
//! A marker's presence is what makes a cached file trustworthy. Markers are
//! named `{solo|legacy}-replay-{ruleset_id}_{score_id}`; the reconciliation
//! worker parses that name back into a [`ReplayKey`] when a marker goes away.

use crate::error::{CacheError, Result};
use crate::event::{KeyspaceEvent, MarkerEvent, MarkerEventKind};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use replay_storage::{ReplayKey, Ruleset};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Marker name for a replay key
pub fn marker_name(key: &ReplayKey) -> String {
    format!(
        "{}-replay-{}_{}",
        key.kind(),
        key.ruleset.id(),
        key.score_id
    )
}

/// Parse a marker name back into the replay key it guards
pub fn parse_marker_name(name: &str) -> Result<ReplayKey> {
    let invalid = || CacheError::InvalidMarker(name.to_string());

    let (kind, ids) = name.split_once("-replay-").ok_or_else(invalid)?;
    let legacy = match kind {
        "legacy" => true,
        "solo" => false,
        _ => return Err(invalid()),
    };

    let (ruleset_id, score_id) = ids.split_once('_').ok_or_else(invalid)?;
    if !is_decimal(ruleset_id) || !is_decimal(score_id) {
        return Err(invalid());
    }
    let ruleset_id: u16 = ruleset_id.parse().map_err(|_| invalid())?;
    let score_id: u64 = score_id.parse().map_err(|_| invalid())?;
    let ruleset = Ruleset::from_id(ruleset_id).map_err(|_| invalid())?;

    Ok(ReplayKey {
        score_id,
        ruleset,
        legacy,
    })
}

fn is_decimal(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

/// External store of expiring markers
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Create or refresh a marker that disappears after `ttl`
    async fn set(&self, name: &str, ttl: Duration) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Delete a marker. Deleting a missing marker succeeds.
    async fn remove(&self, name: &str) -> Result<()>;
}

/// Markers kept in Redis with native key expiry
#[derive(Clone)]
pub struct RedisMarkerStore {
    connection: ConnectionManager,
}

impl RedisMarkerStore {
    pub async fn connect(client: redis::Client) -> Result<Self> {
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl MarkerStore for RedisMarkerStore {
    async fn set(&self, name: &str, ttl: Duration) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(name, 1u8, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let mut connection = self.connection.clone();
        Ok(connection.exists::<_, bool>(name).await?)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        connection.del::<_, ()>(name).await?;
        Ok(())
    }
}

/// In-process marker store.
///
/// Expiry is noticed lazily on lookup. When built with an event sender it
/// reports expiries and evictions the way the Redis keyspace feed does, so the
/// reconciliation worker can run against it.
#[derive(Clone, Default)]
pub struct MemoryMarkerStore {
    markers: Arc<RwLock<HashMap<String, Instant>>>,
    events: Option<mpsc::Sender<KeyspaceEvent>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: mpsc::Sender<KeyspaceEvent>) -> Self {
        Self {
            markers: Arc::default(),
            events: Some(events),
        }
    }

    /// Drop a marker as if the store had evicted it
    pub async fn evict(&self, name: &str) {
        let removed = self.markers.write().await.remove(name).is_some();
        if removed {
            self.notify(MarkerEventKind::Evicted, name).await;
        }
    }

    /// Expire a marker immediately, regardless of its TTL
    pub async fn expire(&self, name: &str) {
        let removed = self.markers.write().await.remove(name).is_some();
        if removed {
            self.notify(MarkerEventKind::Expired, name).await;
        }
    }

    /// Remove the marker only if its deadline has passed, checked under the
    /// write lock so a concurrent `set` is never undone
    async fn reap_if_lapsed(&self, name: &str) -> bool {
        let mut markers = self.markers.write().await;
        match markers.get(name) {
            Some(deadline) if *deadline <= Instant::now() => {
                markers.remove(name);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.markers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.markers.read().await.is_empty()
    }

    async fn notify(&self, kind: MarkerEventKind, name: &str) {
        if let Some(events) = &self.events {
            let event = MarkerEvent {
                kind,
                marker: name.to_string(),
            };
            let _ = events.send(KeyspaceEvent::Marker(event)).await;
        }
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn set(&self, name: &str, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        self.markers.write().await.insert(name.to_string(), deadline);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let deadline = self.markers.read().await.get(name).copied();

        match deadline {
            Some(deadline) if deadline > Instant::now() => Ok(true),
            Some(_) => {
                if self.reap_if_lapsed(name).await {
                    debug!(marker = name, "Marker expired");
                    self.notify(MarkerEventKind::Expired, name).await;
                    Ok(false)
                } else {
                    // refreshed since the read above
                    Ok(self.markers.read().await.contains_key(name))
                }
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.markers.write().await.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_names() {
        assert_eq!(
            marker_name(&ReplayKey::legacy(123, Ruleset::Osu)),
            "legacy-replay-0_123"
        );
        assert_eq!(
            marker_name(&ReplayKey::solo(9, Ruleset::Mania)),
            "solo-replay-3_9"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for key in [
            ReplayKey::solo(1, Ruleset::Osu),
            ReplayKey::legacy(u64::MAX, Ruleset::Fruits),
            ReplayKey::legacy(4501250208, Ruleset::Taiko),
        ] {
            assert_eq!(parse_marker_name(&marker_name(&key)).unwrap(), key);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for name in [
            "",
            "solo-replay-",
            "solo-replay-0",
            "solo-replay-0_",
            "solo-replay-_1",
            "lazer-replay-0_1",
            "legacy-replay-9_1",
            "legacy-replay-0_-1",
            "legacy-replay-0_1_2",
            "legacy-replay-0_+1",
            "solo-replay-+0_1",
            "solo-replay- 0_1",
            "some-other-key",
        ] {
            assert!(
                matches!(parse_marker_name(name), Err(CacheError::InvalidMarker(_))),
                "accepted {:?}",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_memory_store_set_exists_remove() {
        let store = MemoryMarkerStore::new();

        store.set("solo-replay-0_1", Duration::from_secs(60)).await.unwrap();
        assert!(store.exists("solo-replay-0_1").await.unwrap());

        store.remove("solo-replay-0_1").await.unwrap();
        store.remove("solo-replay-0_1").await.unwrap();
        assert!(!store.exists("solo-replay-0_1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_ttl_expiry_emits_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let store = MemoryMarkerStore::with_events(tx);

        store.set("legacy-replay-1_5", Duration::from_secs(3600)).await.unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;

        assert!(!store.exists("legacy-replay-1_5").await.unwrap());
        assert!(store.is_empty().await);

        match rx.try_recv().unwrap() {
            KeyspaceEvent::Marker(event) => {
                assert_eq!(event.kind, MarkerEventKind::Expired);
                assert_eq!(event.marker, "legacy-replay-1_5");
            }
            other => panic!("Expected marker event, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_leaves_refreshed_marker() {
        let (tx, mut rx) = mpsc::channel(10);
        let store = MemoryMarkerStore::with_events(tx);

        store.set("solo-replay-0_3", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        // re-set lands after a lookup saw the lapsed deadline
        store.set("solo-replay-0_3", Duration::from_secs(60)).await.unwrap();

        assert!(!store.reap_if_lapsed("solo-replay-0_3").await);
        assert!(store.exists("solo-replay-0_3").await.unwrap());
        assert_eq!(store.len().await, 1);
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.reap_if_lapsed("solo-replay-0_3").await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_store_evict_emits_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let store = MemoryMarkerStore::with_events(tx);

        store.set("solo-replay-0_2", Duration::from_secs(60)).await.unwrap();
        store.evict("solo-replay-0_2").await;
        // evicting a missing marker is silent
        store.evict("solo-replay-0_2").await;

        assert!(matches!(
            rx.try_recv().unwrap(),
            KeyspaceEvent::Marker(MarkerEvent {
                kind: MarkerEventKind::Evicted,
                ..
            })
        ));
        assert!(rx.try_recv().is_err());
    }
}
