//! Error types for the replay server

use crate::config::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use replay_cache::CacheError;
use replay_storage::StorageError;
use serde_json::json;
use std::fmt;

/// Request-level error, converted into an HTTP response
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound,
    Storage(StorageError),
    Cache(CacheError),
    Database(sqlx::Error),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".into()),
            AppError::Storage(e) if e.is_not_found() => {
                tracing::warn!(error = %e, "Replay missing from storage");
                (StatusCode::NOT_FOUND, "Not found".into())
            }
            AppError::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidRuleset(id) => {
                AppError::BadRequest(format!("Invalid ruleset id: {}", id))
            }
            other => AppError::Storage(other),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

/// Startup failure; the process exits with it
#[derive(Debug)]
pub enum ServerError {
    Config(String),
    Database(sqlx::Error),
    Storage(StorageError),
    Cache(CacheError),
    Io(Box<std::io::Error>),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Database(err) => write!(f, "Database error: {}", err),
            ServerError::Storage(err) => write!(f, "Storage error: {}", err),
            ServerError::Cache(err) => write!(f, "Cache error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Database(err) => Some(err),
            ServerError::Storage(err) => Some(err),
            ServerError::Cache(err) => Some(err),
            ServerError::Io(err) => Some(err.as_ref()),
            ServerError::Config(_) => None,
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<redis::RedisError> for ServerError {
    fn from(err: redis::RedisError) -> Self {
        ServerError::Cache(err.into())
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        ServerError::Database(err)
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        ServerError::Storage(err)
    }
}

impl From<CacheError> for ServerError {
    fn from(err: CacheError) -> Self {
        ServerError::Cache(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound, StatusCode::NOT_FOUND),
            (
                AppError::BadRequest("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Storage(StorageError::NotFound("1".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Cache(CacheError::SubscriptionClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_invalid_ruleset_is_bad_request() {
        let error: AppError = StorageError::InvalidRuleset(9).into();
        assert!(matches!(error, AppError::BadRequest(ref msg) if msg.contains('9')));
    }

    #[test]
    fn test_config_error_display() {
        let err: ServerError = ConfigError::Missing("DATABASE_URL").into();
        assert_eq!(
            format!("{}", err),
            "Configuration error: DATABASE_URL environment variable is required"
        );
    }
}
