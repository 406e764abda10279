//! Events delivered by the marker keyspace subscription

use serde::{Deserialize, Serialize};

/// Lifecycle notifications that end a marker's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerEventKind {
    /// An explicit EXPIRE was applied to the marker
    Expire,
    /// The marker's TTL ran out
    Expired,
    /// The marker was evicted under memory pressure
    Evicted,
}

impl MarkerEventKind {
    pub const ALL: [MarkerEventKind; 3] = [
        MarkerEventKind::Expire,
        MarkerEventKind::Expired,
        MarkerEventKind::Evicted,
    ];

    /// Event name as used in keyevent channel names
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerEventKind::Expire => "expire",
            MarkerEventKind::Expired => "expired",
            MarkerEventKind::Evicted => "evicted",
        }
    }

    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// A single marker lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerEvent {
    pub kind: MarkerEventKind,
    /// Marker name as stored, e.g. `legacy-replay-0_123`
    pub marker: String,
}

/// Events emitted by the keyspace subscription
#[derive(Debug)]
pub enum KeyspaceEvent {
    /// Subscribed to the marker lifecycle channels
    Connected,
    /// Lost the subscription; a reconnect follows
    Disconnected,
    Marker(MarkerEvent),
    /// A subscription-level error occurred
    Error(String),
}
