//! Error types for the replay hot cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    Marker(Box<redis::RedisError>),
    /// A marker name that does not follow `{solo|legacy}-replay-{ruleset}_{score}`
    InvalidMarker(String),
    /// The keyspace event stream ended without a shutdown request
    SubscriptionClosed,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Marker(err) => write!(f, "Marker store error: {}", err),
            CacheError::InvalidMarker(name) => write!(f, "Invalid marker name: {}", name),
            CacheError::SubscriptionClosed => write!(f, "Keyspace subscription closed"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Marker(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Marker(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_marker_display() {
        let err = CacheError::InvalidMarker("solo-replay-x".to_string());
        assert_eq!(format!("{}", err), "Invalid marker name: solo-replay-x");
    }

    #[test]
    fn test_subscription_closed_display() {
        let err = CacheError::SubscriptionClosed;
        assert_eq!(format!("{}", err), "Keyspace subscription closed");
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;
        let err: CacheError = std::io::Error::other("disk full").into();
        assert!(err.source().is_some());
    }
}
