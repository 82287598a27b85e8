//! # mirror-db: Store Adapter for bx-mirror
//!
//! Database access for the mirror workspace: a SQLite connection pool,
//! embedded migrations, and the record store the sync engine writes
//! through.
//!
//! ## Data Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  mirror-sync (SyncEngine)                                        │
//! │       │ count / max_id / upsert_batch / clear                    │
//! │       ▼                                                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                  mirror-db (THIS CRATE)                    │  │
//! │  │                                                            │  │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │  │
//! │  │   │   Database   │   │ RecordStore  │   │  Migrations  │   │  │
//! │  │   │   (pool.rs)  │◄──│ (repository) │   │  (embedded)  │   │  │
//! │  │   └──────────────┘   └──────────────┘   └──────────────┘   │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │       │                                                          │
//! │       ▼                                                          │
//! │  SQLite database (one table per resource type)                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - The record store

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::records::RecordStore;
