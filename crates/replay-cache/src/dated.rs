//! Hot cache bucketed into per-day directories
//!
//! Replays are written to `{dir}/{ddmmyy}/{score_id}`. Nothing expires on its
//! own; [`DatedBucketSweeper`] deletes whole day buckets once they are older
//! than the retention window.

use crate::error::Result;
use crate::layout::CacheLayout;
use crate::ReplayCache;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use replay_storage::ReplayKey;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const BUCKET_FORMAT: &str = "%d%m%y";
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub fn bucket_name(date: NaiveDate) -> String {
    date.format(BUCKET_FORMAT).to_string()
}

fn parse_bucket_name(name: &str) -> Option<NaiveDate> {
    if name.len() != 6 {
        return None;
    }
    NaiveDate::parse_from_str(name, BUCKET_FORMAT).ok()
}

/// Day buckets under `dir`, newest first. A missing `dir` has none.
async fn list_buckets(dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut buckets = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match name.to_str().and_then(parse_bucket_name) {
            Some(date) => buckets.push((date, entry.path())),
            None => warn!(path = %entry.path().display(), "Skipping unrecognised cache directory"),
        }
    }

    buckets.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(buckets)
}

pub struct DatedReplayCache {
    layout: CacheLayout,
}

impl DatedReplayCache {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    async fn add_on(&self, key: &ReplayKey, data: &[u8], today: NaiveDate) -> Result<()> {
        let bucket = self.layout.directory(key).join(bucket_name(today));
        fs::create_dir_all(&bucket).await?;
        fs::write(bucket.join(key.file_name()), data).await?;

        debug!(key = %key, bucket = %bucket.display(), "Cached replay");
        Ok(())
    }
}

#[async_trait]
impl ReplayCache for DatedReplayCache {
    async fn add(&self, key: &ReplayKey, data: &[u8]) -> Result<()> {
        self.add_on(key, data, Utc::now().date_naive()).await
    }

    async fn find(&self, key: &ReplayKey) -> Result<Option<Vec<u8>>> {
        for (_, bucket) in list_buckets(&self.layout.directory(key)).await? {
            match fs::read(bucket.join(key.file_name())).await {
                Ok(data) => {
                    debug!(key = %key, bucket = %bucket.display(), "Cache hit");
                    return Ok(Some(data));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }

        debug!(key = %key, "Cache miss");
        Ok(None)
    }

    async fn remove(&self, key: &ReplayKey) -> Result<()> {
        for (_, bucket) in list_buckets(&self.layout.directory(key)).await? {
            match fs::remove_file(bucket.join(key.file_name())).await {
                Ok(()) => debug!(key = %key, bucket = %bucket.display(), "Removed cached replay"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Deletes day buckets older than the retention window
pub struct DatedBucketSweeper {
    roots: Vec<PathBuf>,
    retention_days: i64,
}

impl DatedBucketSweeper {
    pub fn new(layout: &CacheLayout, retention_days: i64) -> Self {
        Self {
            roots: layout.roots(),
            retention_days,
        }
    }

    /// Delete every bucket whose age in days exceeds the retention window.
    ///
    /// A root that fails is logged and skipped; the rest are still swept.
    /// Returns the number of buckets deleted.
    pub async fn sweep_once(&self, today: NaiveDate) -> usize {
        let mut deleted = 0;

        for root in &self.roots {
            match self.sweep_root(root, today, &mut deleted).await {
                Ok(()) => {}
                Err(e) => error!(root = %root.display(), "Cache sweep failed: {}", e),
            }
        }

        deleted
    }

    async fn sweep_root(&self, root: &Path, today: NaiveDate, deleted: &mut usize) -> Result<()> {
        for (date, bucket) in list_buckets(root).await? {
            let age = (today - date).num_days();
            if age <= self.retention_days {
                continue;
            }

            match fs::remove_dir_all(&bucket).await {
                Ok(()) => {
                    info!(bucket = %bucket.display(), age_days = age, "Deleted expired cache bucket");
                    *deleted += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Sweep once an hour until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        info!(
            retention_days = self.retention_days,
            roots = self.roots.len(),
            "Dated cache sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    match self.sweep_once(Utc::now().date_naive()).await {
                        0 => debug!("Cache sweep found nothing to delete"),
                        deleted => info!(deleted, "Cache sweep complete"),
                    }
                }
            }
        }

        info!("Dated cache sweeper stopped");
    }
}
