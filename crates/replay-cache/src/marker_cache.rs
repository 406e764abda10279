//! Hot cache whose entries live exactly as long as their marker

use crate::error::Result;
use crate::layout::CacheLayout;
use crate::marker::{marker_name, MarkerStore};
use crate::ReplayCache;
use async_trait::async_trait;
use replay_storage::ReplayKey;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Flat file cache validated by expiring markers.
///
/// Files sit directly in the directory for their (legacy, ruleset) pair. A
/// file without a live marker is treated as absent; the reconciliation worker
/// deletes such files when it hears the marker went away.
pub struct MarkerReplayCache {
    layout: CacheLayout,
    markers: Arc<dyn MarkerStore>,
    ttl: Duration,
}

impl MarkerReplayCache {
    pub fn new(layout: CacheLayout, markers: Arc<dyn MarkerStore>, ttl: Duration) -> Self {
        Self {
            layout,
            markers,
            ttl,
        }
    }

    pub fn path(&self, key: &ReplayKey) -> PathBuf {
        self.layout.directory(key).join(key.file_name())
    }

    pub async fn marker_exists(&self, key: &ReplayKey) -> Result<bool> {
        self.markers.exists(&marker_name(key)).await
    }

    /// Delete the cached file only, leaving the marker alone.
    ///
    /// Returns whether a file was removed.
    pub async fn purge(&self, key: &ReplayKey) -> Result<bool> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => {
                debug!(key = %key, "Purged cached replay");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ReplayCache for MarkerReplayCache {
    async fn add(&self, key: &ReplayKey, data: &[u8]) -> Result<()> {
        fs::create_dir_all(self.layout.directory(key)).await?;
        fs::write(self.path(key), data).await?;

        // The file must exist before its marker does.
        self.markers.set(&marker_name(key), self.ttl).await?;

        debug!(key = %key, size = data.len(), ttl_secs = self.ttl.as_secs(), "Cached replay");
        Ok(())
    }

    async fn find(&self, key: &ReplayKey) -> Result<Option<Vec<u8>>> {
        if !self.marker_exists(key).await? {
            debug!(key = %key, "Cache miss (no marker)");
            return Ok(None);
        }

        match fs::read(self.path(key)).await {
            Ok(data) => {
                debug!(key = %key, "Cache hit");
                Ok(Some(data))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = %key, "Cache miss (marker without file)");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &ReplayKey) -> Result<()> {
        self.markers.remove(&marker_name(key)).await?;
        self.purge(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MemoryMarkerStore;
    use replay_storage::Ruleset;
    use tempfile::tempdir;

    fn create_cache(root: &std::path::Path) -> (MarkerReplayCache, MemoryMarkerStore) {
        let markers = MemoryMarkerStore::new();
        let layout = CacheLayout::new(
            root.join("solo"),
            root.join("legacy-{ruleset}").to_string_lossy().into_owned(),
        );
        let cache = MarkerReplayCache::new(
            layout,
            Arc::new(markers.clone()),
            Duration::from_secs(24 * 3600),
        );
        (cache, markers)
    }

    #[tokio::test]
    async fn test_add_then_find() {
        let dir = tempdir().unwrap();
        let (cache, _) = create_cache(dir.path());
        let key = ReplayKey::solo(1, Ruleset::Osu);

        cache.add(&key, b"replay").await.unwrap();

        assert_eq!(cache.find(&key).await.unwrap(), Some(b"replay".to_vec()));
    }

    #[tokio::test]
    async fn test_find_without_entry_is_miss() {
        let dir = tempdir().unwrap();
        let (cache, _) = create_cache(dir.path());

        let found = cache.find(&ReplayKey::legacy(1, Ruleset::Osu)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_missing_marker_hides_stale_file() {
        let dir = tempdir().unwrap();
        let (cache, markers) = create_cache(dir.path());
        let key = ReplayKey::legacy(7, Ruleset::Taiko);

        cache.add(&key, b"full replay").await.unwrap();
        markers.evict(&marker_name(&key)).await;

        assert!(cache.path(&key).exists());
        assert!(cache.find(&key).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_with_marker_ttl() {
        let dir = tempdir().unwrap();
        let (cache, _) = create_cache(dir.path());
        let key = ReplayKey::solo(3, Ruleset::Mania);

        cache.add(&key, b"replay").await.unwrap();
        tokio::time::advance(Duration::from_secs(23 * 3600)).await;
        assert!(cache.find(&key).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        assert!(cache.find(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_twice() {
        let dir = tempdir().unwrap();
        let (cache, markers) = create_cache(dir.path());
        let key = ReplayKey::solo(4, Ruleset::Osu);

        cache.add(&key, b"replay").await.unwrap();
        cache.remove(&key).await.unwrap();
        cache.remove(&key).await.unwrap();

        assert!(!cache.path(&key).exists());
        assert!(markers.is_empty().await);
        assert!(cache.find(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let dir = tempdir().unwrap();
        let (cache, _) = create_cache(dir.path());
        let solo = ReplayKey::solo(10, Ruleset::Osu);
        let legacy_osu = ReplayKey::legacy(10, Ruleset::Osu);
        let legacy_mania = ReplayKey::legacy(10, Ruleset::Mania);

        cache.add(&solo, b"solo").await.unwrap();
        cache.add(&legacy_osu, b"legacy").await.unwrap();

        assert_eq!(cache.find(&solo).await.unwrap(), Some(b"solo".to_vec()));
        assert_eq!(
            cache.find(&legacy_osu).await.unwrap(),
            Some(b"legacy".to_vec())
        );
        assert!(cache.find(&legacy_mania).await.unwrap().is_none());

        cache.remove(&legacy_osu).await.unwrap();
        assert_eq!(cache.find(&solo).await.unwrap(), Some(b"solo".to_vec()));
    }

    #[tokio::test]
    async fn test_purge_keeps_marker() {
        let dir = tempdir().unwrap();
        let (cache, markers) = create_cache(dir.path());
        let key = ReplayKey::solo(5, Ruleset::Osu);

        cache.add(&key, b"replay").await.unwrap();

        assert!(cache.purge(&key).await.unwrap());
        assert!(!cache.purge(&key).await.unwrap());
        assert_eq!(markers.len().await, 1);
    }
}
