//! Durable replay storage
//!
//! The authoritative copy of every uploaded replay lives here, either on the
//! local filesystem or in S3-compatible object storage. The backend is picked
//! once at startup and shared as an `Arc<dyn ReplayStorage>`.

pub mod error;
pub mod key;
mod local;
mod object;
pub mod ruleset;

pub use error::{Result, StorageError};
pub use key::ReplayKey;
pub use local::LocalReplayStorage;
pub use object::{ObjectReplayStorage, S3StorageConfig};
pub use ruleset::Ruleset;

use async_trait::async_trait;

/// Store, fetch and delete replay blobs by key.
///
/// Storing over an existing key replaces it. Deleting a key that holds no
/// blob succeeds.
#[async_trait]
pub trait ReplayStorage: Send + Sync {
    async fn store(&self, key: &ReplayKey, data: &[u8]) -> Result<()>;

    /// Returns [`StorageError::NotFound`] when nothing is stored under `key`
    async fn fetch(&self, key: &ReplayKey) -> Result<Vec<u8>>;

    async fn delete(&self, key: &ReplayKey) -> Result<()>;
}

/// Which durable backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            other => Err(format!("unknown storage backend `{}`", other)),
        }
    }
}
