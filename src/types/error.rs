//! Error types for the DOI updater

/// Main error type for updater infrastructure. Authority failures use `DoiError`.
#[derive(Debug, thiserror::Error)]
pub enum UpdaterError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// Implement From conversions for common error types

impl From<serde_json::Error> for UpdaterError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for UpdaterError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for UpdaterError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode error: {}", err))
    }
}

/// Result type alias for updater operations
pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = UpdaterError::Database("connection refused".into());
        assert_eq!(err.to_string(), "Database error: connection refused");
    }

    #[test]
    fn test_json_error_maps_to_bad_request() {
        let err: UpdaterError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, UpdaterError::BadRequest(_)));
        assert!(err.to_string().starts_with("Bad request: JSON error"));
    }
}
