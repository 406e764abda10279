//! Replay server - durable replay storage with a local hot cache
//!
//! Accepts replay uploads, keeps the authoritative copy on disk or in S3,
//! serves downloads from a local cache when possible, and rebuilds legacy
//! replay headers from the score database.

mod config;
mod error;
mod replays;
mod server;
mod state;
mod types;

use crate::config::{CacheStrategy, Config, StorageConfig};
use crate::error::Result;
use crate::server::start_server;
use crate::state::AppState;
use replay_cache::{
    CacheLayout, DatedBucketSweeper, DatedReplayCache, KeyspaceEvent, KeyspaceSubscription,
    MarkerReplayCache, ReconcileStats, ReconciliationWorker, RedisMarkerStore, ReplayCache,
};
use replay_db::MySqlScoreRepository;
use replay_storage::{LocalReplayStorage, ObjectReplayStorage, ReplayStorage};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DB_MAX_CONNECTIONS: u32 = 16;
const KEYSPACE_CHANNEL_SIZE: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("replay_server=info".parse()?)
        .add_directive("replay_cache=info".parse()?)
        .add_directive("replay_storage=info".parse()?)
        .add_directive("tower_http=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting replay server...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Cache strategy: {}", config.cache.strategy.name());
    info!("Request timeout: {:?}", config.request_timeout);

    let pool = MySqlPoolOptions::new()
        .max_connections(DB_MAX_CONNECTIONS)
        .connect(&config.database_url)
        .await?;
    let scores = Arc::new(MySqlScoreRepository::new(pool));

    let storage: Arc<dyn ReplayStorage> = match &config.storage {
        StorageConfig::Local {
            path,
            legacy_path_template,
        } => {
            info!("Storage: local ({:?})", path);
            Arc::new(LocalReplayStorage::new(path.clone(), legacy_path_template.clone()))
        }
        StorageConfig::S3(s3) => {
            info!("Storage: s3 (bucket {})", s3.bucket);
            Arc::new(ObjectReplayStorage::connect(s3)?)
        }
    };

    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let layout = CacheLayout::new(
        config.cache.path.clone(),
        config.cache.legacy_path_template.clone(),
    );

    let state = match &config.cache.strategy {
        CacheStrategy::Marker { redis_url, ttl } => {
            info!("Marker TTL: {} hours", ttl.as_secs() / 3600);

            let client = redis::Client::open(redis_url.as_str())?;
            let markers = RedisMarkerStore::connect(client.clone()).await?;
            let cache = Arc::new(MarkerReplayCache::new(layout, Arc::new(markers), *ttl));

            let stats = Arc::new(ReconcileStats::new());
            let (event_tx, event_rx) = mpsc::channel::<KeyspaceEvent>(KEYSPACE_CHANNEL_SIZE);

            let subscription = KeyspaceSubscription::new(client, event_tx);
            let subscription_shutdown = shutdown.clone();
            tasks.spawn(async move { subscription.run(subscription_shutdown).await });

            let worker = ReconciliationWorker::new(cache.clone(), stats.clone());
            tasks.spawn(worker.run(event_rx, shutdown.clone()));

            let cache: Arc<dyn ReplayCache> = cache;
            AppState::new(storage, cache, scores, config.cache.strategy.name())
                .with_reconcile_stats(stats)
        }
        CacheStrategy::Dated { retention_days } => {
            info!("Cache retention: {} days", retention_days);

            let sweeper = DatedBucketSweeper::new(&layout, *retention_days);
            tasks.spawn(sweeper.run(shutdown.clone()));

            let cache: Arc<dyn ReplayCache> = Arc::new(DatedReplayCache::new(layout));
            AppState::new(storage, cache, scores, config.cache.strategy.name())
        }
    };

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    let served = start_server(
        Arc::new(state),
        config.port,
        config.request_timeout,
        shutdown.clone(),
    )
    .await;

    // Stop background tasks whether the server exited cleanly or not
    shutdown.cancel();
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Background task failed: {}", e);
        }
    }

    served?;
    info!("Replay server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested");
}
