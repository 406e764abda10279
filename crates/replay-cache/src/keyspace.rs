//! Redis keyevent subscription for marker lifecycle notifications
//!
//! Listens on `__keyevent@{db}__:{expire,expired,evicted}` and forwards
//! every marker-shaped key as a [`KeyspaceEvent::Marker`]. The connection is
//! re-established with capped exponential backoff until shutdown.

use crate::error::{CacheError, Result};
use crate::event::{KeyspaceEvent, MarkerEvent, MarkerEventKind};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// `E` keyevent channels, `g` generic commands (`expire`), `x` expired, `e` evicted
const NOTIFY_KEYSPACE_EVENTS: &str = "Egxe";

const MARKER_INFIX: &str = "-replay-";

pub fn channel_name(db: i64, kind: MarkerEventKind) -> String {
    format!("__keyevent@{}__:{}", db, kind.as_str())
}

/// Turn a keyevent message into a marker event.
///
/// Messages for other channels, and keys that are obviously not markers, yield
/// `None`.
pub fn parse_keyevent(channel: &str, key: &str) -> Option<MarkerEvent> {
    let (prefix, event) = channel.split_once("__:")?;
    if !prefix.starts_with("__keyevent@") {
        return None;
    }
    let kind = MarkerEventKind::from_event_name(event)?;

    if !key.contains(MARKER_INFIX) {
        return None;
    }

    Some(MarkerEvent {
        kind,
        marker: key.to_string(),
    })
}

fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    INITIAL_RECONNECT_DELAY
        .saturating_mul(factor)
        .min(MAX_RECONNECT_DELAY)
}

pub struct KeyspaceSubscription {
    client: redis::Client,
    db: i64,
    event_tx: mpsc::Sender<KeyspaceEvent>,
}

impl KeyspaceSubscription {
    pub fn new(client: redis::Client, event_tx: mpsc::Sender<KeyspaceEvent>) -> Self {
        let db = client.get_connection_info().redis.db;
        Self {
            client,
            db,
            event_tx,
        }
    }

    fn channels(&self) -> Vec<String> {
        MarkerEventKind::ALL
            .into_iter()
            .map(|kind| channel_name(self.db, kind))
            .collect()
    }

    /// Ask the server to publish the events we listen for.
    ///
    /// Managed instances commonly reject CONFIG; that only gets a warning.
    pub async fn enable_notifications(&self) {
        let result: Result<()> = async {
            let mut connection = self.client.get_multiplexed_async_connection().await?;
            let _: () = redis::cmd("CONFIG")
                .arg("SET")
                .arg("notify-keyspace-events")
                .arg(NOTIFY_KEYSPACE_EVENTS)
                .query_async(&mut connection)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => info!(flags = NOTIFY_KEYSPACE_EVENTS, "Enabled keyspace notifications"),
            Err(e) => warn!(
                "Could not enable keyspace notifications ({}); relying on server configuration",
                e
            ),
        }
    }

    /// Run until `shutdown` fires, reconnecting on failure
    pub async fn run(&self, shutdown: CancellationToken) {
        self.enable_notifications().await;

        let mut reconnect_attempts = 0;

        loop {
            let result = self.connect_and_stream(&shutdown, &mut reconnect_attempts).await;

            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = result {
                error!("Keyspace subscription error: {}", e);
                let _ = self.event_tx.send(KeyspaceEvent::Error(e.to_string())).await;
            }

            reconnect_attempts += 1;
            let delay = reconnect_delay(reconnect_attempts);
            warn!(
                "Resubscribing in {:?} (attempt {})",
                delay, reconnect_attempts
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Keyspace subscription stopped");
    }

    async fn connect_and_stream(
        &self,
        shutdown: &CancellationToken,
        reconnect_attempts: &mut u32,
    ) -> Result<()> {
        let channels = self.channels();
        info!(db = self.db, "Subscribing to marker keyevents");

        let mut pubsub = self.client.get_async_pubsub().await?;
        for channel in &channels {
            pubsub.subscribe(channel).await?;
        }

        let _ = self.event_tx.send(KeyspaceEvent::Connected).await;
        *reconnect_attempts = 0;

        let outcome = {
            let mut messages = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break Ok(()),
                    message = messages.next() => {
                        let Some(message) = message else {
                            break Err(CacheError::SubscriptionClosed);
                        };

                        let key: String = match message.get_payload() {
                            Ok(key) => key,
                            Err(e) => {
                                debug!("Ignoring keyevent with unreadable payload: {}", e);
                                continue;
                            }
                        };

                        if let Some(event) = parse_keyevent(message.get_channel_name(), &key) {
                            if self.event_tx.send(KeyspaceEvent::Marker(event)).await.is_err() {
                                // worker is gone; nothing left to deliver to
                                break Ok(());
                            }
                        }
                    }
                }
            }
        };

        let _ = self.event_tx.send(KeyspaceEvent::Disconnected).await;

        if outcome.is_ok() {
            for channel in &channels {
                if let Err(e) = pubsub.unsubscribe(channel).await {
                    debug!("Unsubscribe from {} failed: {}", channel, e);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(
            channel_name(0, MarkerEventKind::Expired),
            "__keyevent@0__:expired"
        );
        assert_eq!(
            channel_name(3, MarkerEventKind::Evicted),
            "__keyevent@3__:evicted"
        );
    }

    #[test]
    fn test_parse_keyevent() {
        let event = parse_keyevent("__keyevent@0__:expired", "legacy-replay-0_123").unwrap();
        assert_eq!(event.kind, MarkerEventKind::Expired);
        assert_eq!(event.marker, "legacy-replay-0_123");

        let event = parse_keyevent("__keyevent@2__:expire", "solo-replay-1_9").unwrap();
        assert_eq!(event.kind, MarkerEventKind::Expire);
    }

    #[test]
    fn test_parse_keyevent_ignores_other_traffic() {
        assert!(parse_keyevent("__keyevent@0__:del", "solo-replay-0_1").is_none());
        assert!(parse_keyevent("__keyspace@0__:solo-replay-0_1", "expired").is_none());
        assert!(parse_keyevent("__keyevent@0__:expired", "session:abc").is_none());
        assert!(parse_keyevent("news", "solo-replay-0_1").is_none());
    }

    #[test]
    fn test_parse_keyevent_passes_malformed_markers_through() {
        // left for the worker to reject and count
        let event = parse_keyevent("__keyevent@0__:evicted", "solo-replay-x").unwrap();
        assert_eq!(event.marker, "solo-replay-x");
    }

    #[test]
    fn test_reconnect_delay_is_capped() {
        assert_eq!(reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(reconnect_delay(2), Duration::from_secs(2));
        assert_eq!(reconnect_delay(6), Duration::from_secs(32));
        assert_eq!(reconnect_delay(7), MAX_RECONNECT_DELAY);
        assert_eq!(reconnect_delay(100), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_subscription_channels_use_client_db() {
        let client = redis::Client::open("redis://127.0.0.1:6379/4").unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let subscription = KeyspaceSubscription::new(client, tx);

        assert_eq!(
            subscription.channels(),
            vec![
                "__keyevent@4__:expire",
                "__keyevent@4__:expired",
                "__keyevent@4__:evicted",
            ]
        );
    }
}
