//! Replay storage on S3-compatible object storage

use crate::error::{Result, StorageError};
use crate::key::ReplayKey;
use crate::ruleset::Ruleset;
use crate::ReplayStorage;
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStore, PutPayload, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const HTTP_POOL_SIZE: usize = 32;

/// Connection settings for the S3 backend
#[derive(Debug, Clone)]
pub struct S3StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services; AWS is used when unset
    pub endpoint: Option<String>,
    pub bucket: String,
    /// Per-ruleset bucket template, e.g. `replays-{ruleset}`
    pub legacy_bucket_template: String,
    pub max_retries: usize,
    pub timeout: Duration,
}

/// Stores replays as objects keyed by decimal score id.
///
/// Solo replays go to a single bucket, legacy replays to one bucket per
/// ruleset. A client per bucket is built once and reused for every request.
pub struct ObjectReplayStorage {
    replays: Arc<dyn ObjectStore>,
    legacy_replays: [Arc<dyn ObjectStore>; 4],
}

impl ObjectReplayStorage {
    /// Wrap already-constructed stores. `legacy_replays` is indexed by ruleset id.
    pub fn new(replays: Arc<dyn ObjectStore>, legacy_replays: [Arc<dyn ObjectStore>; 4]) -> Self {
        Self {
            replays,
            legacy_replays,
        }
    }

    /// Build S3 clients for the solo bucket and each legacy bucket
    pub fn connect(config: &S3StorageConfig) -> Result<Self> {
        let replays = Self::build_client(config, &config.bucket)?;

        let [osu, taiko, fruits, mania] = Ruleset::ALL.map(|ruleset| {
            Self::build_client(config, &ruleset.format_template(&config.legacy_bucket_template))
        });

        info!(
            bucket = %config.bucket,
            legacy_bucket_template = %config.legacy_bucket_template,
            region = %config.region,
            "S3 replay storage configured"
        );

        Ok(Self::new(replays, [osu?, taiko?, fruits?, mania?]))
    }

    fn build_client(config: &S3StorageConfig, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let client_options = ClientOptions::new()
            .with_allow_http(true)
            .with_timeout(config.timeout)
            .with_pool_max_idle_per_host(HTTP_POOL_SIZE);

        let retry = RetryConfig {
            max_retries: config.max_retries,
            ..Default::default()
        };

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(true)
            .with_client_options(client_options)
            .with_retry(retry);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        Ok(Arc::new(builder.build()?))
    }

    fn bucket(&self, key: &ReplayKey) -> &Arc<dyn ObjectStore> {
        if key.legacy {
            &self.legacy_replays[key.ruleset.id() as usize]
        } else {
            &self.replays
        }
    }

    fn object_path(key: &ReplayKey) -> Path {
        Path::from(key.file_name())
    }
}

#[async_trait]
impl ReplayStorage for ObjectReplayStorage {
    async fn store(&self, key: &ReplayKey, data: &[u8]) -> Result<()> {
        info!(key = %key, size = data.len(), "Uploading replay");

        self.bucket(key)
            .put(&Self::object_path(key), PutPayload::from(data.to_vec()))
            .await?;
        Ok(())
    }

    async fn fetch(&self, key: &ReplayKey) -> Result<Vec<u8>> {
        debug!(key = %key, "Retrieving replay");

        let result = self.bucket(key).get(&Self::object_path(key)).await;
        let bytes = match result {
            Ok(object) => object.bytes().await?,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &ReplayKey) -> Result<()> {
        match self.bucket(key).delete(&Self::object_path(key)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {
                debug!(key = %key, "Deleted replay");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn create_storage() -> (ObjectReplayStorage, Arc<InMemory>, [Arc<InMemory>; 4]) {
        let replays = Arc::new(InMemory::new());
        let legacy = [(); 4].map(|_| Arc::new(InMemory::new()));
        let storage = ObjectReplayStorage::new(
            replays.clone(),
            legacy.clone().map(|store| store as Arc<dyn ObjectStore>),
        );
        (storage, replays, legacy)
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let (storage, _, _) = create_storage();
        let key = ReplayKey::solo(1234, Ruleset::Osu);

        storage.store(&key, b"replay").await.unwrap();

        assert_eq!(storage.fetch(&key).await.unwrap(), b"replay");
    }

    #[tokio::test]
    async fn test_object_key_is_decimal_score_id() {
        let (storage, replays, _) = create_storage();
        let key = ReplayKey::solo(98765, Ruleset::Osu);

        storage.store(&key, b"replay").await.unwrap();

        let object = replays.get(&Path::from("98765")).await.unwrap();
        assert_eq!(object.bytes().await.unwrap().as_ref(), b"replay");
    }

    #[tokio::test]
    async fn test_legacy_uses_ruleset_bucket() {
        let (storage, replays, legacy) = create_storage();
        let key = ReplayKey::legacy(5, Ruleset::Fruits);

        storage.store(&key, b"frames").await.unwrap();

        assert!(legacy[2].get(&Path::from("5")).await.is_ok());
        assert!(legacy[0].get(&Path::from("5")).await.is_err());
        assert!(replays.get(&Path::from("5")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let (storage, _, _) = create_storage();

        let err = storage
            .fetch(&ReplayKey::legacy(1, Ruleset::Taiko))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (storage, _, _) = create_storage();
        let key = ReplayKey::solo(2, Ruleset::Mania);

        storage.store(&key, b"replay").await.unwrap();
        storage.delete(&key).await.unwrap();
        storage.delete(&key).await.unwrap();

        assert!(storage.fetch(&key).await.unwrap_err().is_not_found());
    }
}
