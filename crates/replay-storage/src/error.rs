//! Error types for durable replay storage

use std::fmt;

#[derive(Debug)]
pub enum StorageError {
    /// No blob is stored under the requested key
    NotFound(String),
    InvalidRuleset(u16),
    Io(Box<std::io::Error>),
    ObjectStore(Box<object_store::Error>),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(key) => write!(f, "Replay not found: {}", key),
            StorageError::InvalidRuleset(id) => write!(f, "Invalid ruleset id: {}", id),
            StorageError::Io(err) => write!(f, "IO error: {}", err),
            StorageError::ObjectStore(err) => write!(f, "Object store error: {}", err),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err.as_ref()),
            StorageError::ObjectStore(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(Box::new(err))
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
            other => StorageError::ObjectStore(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
