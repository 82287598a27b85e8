//! # Sync Error Types
//!
//! Error types for the sync engine.
//!
//! Soft failures (a timed-out page fetch, a count probe that errors) never
//! appear here: they are absorbed at the remote client boundary and
//! surface as empty results. What remains is configuration trouble,
//! rejected operation requests, and hard persistence failures.

use mirror_core::ResourceType;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering configuration, request rejection, and
/// persistence failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Invalid remote base URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    // =========================================================================
    // Rejected Operation Requests
    // =========================================================================
    /// A start request arrived while a session was already active.
    #[error("Sync already running for {resource}")]
    SessionAlreadyRunning { resource: ResourceType },

    /// A stop request arrived with no session active.
    #[error("No sync running for {resource}")]
    SessionNotRunning { resource: ResourceType },

    /// A clear request arrived while a session was active.
    #[error("Sync is running for {resource}, cannot clear")]
    SessionActive { resource: ResourceType },

    /// A resource name from an external caller did not parse.
    #[error(transparent)]
    UnknownResource(#[from] mirror_core::CoreError),

    // =========================================================================
    // Hard Failures
    // =========================================================================
    /// A store operation failed (fails the batch and the session).
    #[error("Database error: {0}")]
    Database(#[from] mirror_db::DbError),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::HttpClient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages_name_the_resource() {
        let err = SyncError::SessionAlreadyRunning {
            resource: ResourceType::Deals,
        };
        assert!(err.to_string().contains("deals"));

        let err = SyncError::SessionActive {
            resource: ResourceType::Tasks,
        };
        assert!(err.to_string().contains("cannot clear"));
    }
}
