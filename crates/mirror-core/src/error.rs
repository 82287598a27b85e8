//! # Error Types
//!
//! Domain errors for mirror-core. Database and sync errors live in their
//! own crates (`mirror-db::DbError`, `mirror-sync::SyncError`); everything
//! here is producible by pure code.

use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A resource name from an external caller did not match the closed set.
    #[error("Unknown resource: '{0}'. Valid options: deals, tasks, projects")]
    UnknownResource(String),

    /// A record payload was not a JSON object.
    #[error("Record payload is not a JSON object")]
    NotAnObject,
}
