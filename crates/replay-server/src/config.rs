//! Service configuration read from the environment

use replay_storage::{S3StorageConfig, StorageBackend};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "{} environment variable is required", name)
            }
            ConfigError::Invalid { name, value } => {
                write!(f, "{} has an invalid value: {:?}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Durable tier settings
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        path: PathBuf,
        legacy_path_template: String,
    },
    S3(S3StorageConfig),
}

/// Hot cache strategy and its settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStrategy {
    Marker { redis_url: String, ttl: Duration },
    Dated { retention_days: i64 },
}

impl CacheStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            CacheStrategy::Marker { .. } => "marker",
            CacheStrategy::Dated { .. } => "dated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub legacy_path_template: String,
    pub strategy: CacheStrategy,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let port = vars.parse_or("PORT", 8080)?;
        let database_url = vars.required("DATABASE_URL")?;

        let backend: StorageBackend = vars.parse_required("REPLAY_STORAGE_TYPE")?;
        let storage = match backend {
            StorageBackend::Local => StorageConfig::Local {
                path: vars.required("LOCAL_REPLAY_STORAGE_PATH")?.into(),
                legacy_path_template: vars.required("LOCAL_LEGACY_REPLAY_STORAGE_PATH")?,
            },
            StorageBackend::S3 => StorageConfig::S3(S3StorageConfig {
                access_key: vars.required("S3_ACCESS_KEY")?,
                secret_key: vars.required("S3_SECRET_KEY")?,
                region: vars.required("S3_REPLAYS_BUCKET_REGION")?,
                endpoint: vars.optional("S3_ENDPOINT"),
                bucket: vars.required("S3_REPLAYS_BUCKET_NAME")?,
                legacy_bucket_template: vars.required("S3_LEGACY_REPLAYS_BUCKET_NAME")?,
                max_retries: vars.parse_or("S3_MAX_RETRIES", 5)?,
                timeout: Duration::from_secs(vars.parse_or("S3_TIMEOUT_SECS", 60)?),
            }),
        };

        let strategy = match vars
            .optional("REPLAY_CACHE_STRATEGY")
            .unwrap_or_else(|| "marker".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "marker" => CacheStrategy::Marker {
                redis_url: vars.required("REDIS_URL")?,
                ttl: Duration::from_secs(vars.parse_or::<u64>("REPLAY_CACHE_HOURS", 24)? * 3600),
            },
            "dated" => CacheStrategy::Dated {
                retention_days: vars.parse_or("REPLAY_CACHE_DAYS", 1)?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "REPLAY_CACHE_STRATEGY",
                    value: other.to_string(),
                })
            }
        };

        let cache = CacheConfig {
            path: vars.required("REPLAY_CACHE_STORAGE_PATH")?.into(),
            legacy_path_template: vars.required("LEGACY_REPLAY_CACHE_STORAGE_PATH")?,
            strategy,
        };

        let request_timeout = Duration::from_secs(vars.parse_or("REQUEST_TIMEOUT_SECS", 30)?);

        Ok(Config {
            port,
            database_url,
            storage,
            cache,
            request_timeout,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Unset and blank are the same thing
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_required<T: FromStr>(&self, name: &'static str) -> Result<T, ConfigError> {
        let value = self.required(name)?;
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value })
    }

    fn parse_or<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(default),
        }
    }
}
