//! Replay storage on the local filesystem

use crate::error::{Result, StorageError};
use crate::key::ReplayKey;
use crate::ReplayStorage;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Stores each replay as a file named by its score id.
///
/// Solo replays share one directory. Legacy replays get one directory per
/// ruleset, derived from a template such as `/data/legacy/{ruleset}`.
#[derive(Debug, Clone)]
pub struct LocalReplayStorage {
    base_dir: PathBuf,
    legacy_dir_template: String,
}

impl LocalReplayStorage {
    pub fn new(base_dir: impl Into<PathBuf>, legacy_dir_template: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            legacy_dir_template: legacy_dir_template.into(),
        }
    }

    fn directory(&self, key: &ReplayKey) -> PathBuf {
        if key.legacy {
            PathBuf::from(key.ruleset.format_template(&self.legacy_dir_template))
        } else {
            self.base_dir.clone()
        }
    }

    pub fn path(&self, key: &ReplayKey) -> PathBuf {
        self.directory(key).join(key.file_name())
    }
}

#[async_trait]
impl ReplayStorage for LocalReplayStorage {
    async fn store(&self, key: &ReplayKey, data: &[u8]) -> Result<()> {
        fs::create_dir_all(self.directory(key)).await?;
        let path = self.path(key);
        fs::write(&path, data).await?;
        debug!(key = %key, path = ?path, size = data.len(), "Stored replay");
        Ok(())
    }

    async fn fetch(&self, key: &ReplayKey) -> Result<Vec<u8>> {
        match fs::read(self.path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &ReplayKey) -> Result<()> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => {
                debug!(key = %key, "Deleted replay");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::Ruleset;
    use tempfile::tempdir;

    fn create_storage(root: &std::path::Path) -> LocalReplayStorage {
        LocalReplayStorage::new(
            root.join("solo"),
            root.join("legacy_{ruleset}").to_string_lossy().into_owned(),
        )
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let dir = tempdir().unwrap();
        let storage = create_storage(dir.path());
        let key = ReplayKey::solo(1, Ruleset::Osu);

        storage.store(&key, b"replay data").await.unwrap();

        assert_eq!(storage.fetch(&key).await.unwrap(), b"replay data");
        assert_eq!(storage.path(&key), dir.path().join("solo").join("1"));
    }

    #[tokio::test]
    async fn test_legacy_path_uses_ruleset_directory() {
        let dir = tempdir().unwrap();
        let storage = create_storage(dir.path());
        let key = ReplayKey::legacy(5, Ruleset::Taiko);

        storage.store(&key, b"frames").await.unwrap();

        assert!(dir.path().join("legacy_taiko").join("5").exists());
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let dir = tempdir().unwrap();
        let storage = create_storage(dir.path());
        let key = ReplayKey::solo(1, Ruleset::Osu);

        storage.store(&key, b"first upload").await.unwrap();
        storage.store(&key, b"second").await.unwrap();

        assert_eq!(storage.fetch(&key).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = create_storage(dir.path());

        let err = storage
            .fetch(&ReplayKey::solo(404, Ruleset::Osu))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = create_storage(dir.path());
        let key = ReplayKey::legacy(3, Ruleset::Mania);

        storage.store(&key, b"frames").await.unwrap();
        storage.delete(&key).await.unwrap();
        storage.delete(&key).await.unwrap();

        assert!(storage.fetch(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_keys_do_not_collide() {
        let dir = tempdir().unwrap();
        let storage = create_storage(dir.path());
        let solo = ReplayKey::solo(1, Ruleset::Osu);
        let legacy_osu = ReplayKey::legacy(1, Ruleset::Osu);
        let legacy_taiko = ReplayKey::legacy(1, Ruleset::Taiko);

        storage.store(&solo, b"solo").await.unwrap();
        storage.store(&legacy_osu, b"legacy osu").await.unwrap();

        assert_eq!(storage.fetch(&solo).await.unwrap(), b"solo");
        assert_eq!(storage.fetch(&legacy_osu).await.unwrap(), b"legacy osu");
        assert!(storage.fetch(&legacy_taiko).await.unwrap_err().is_not_found());
    }
}
