//! # mirror-sync: Sync Engine for bx-mirror
//!
//! Incremental, concurrent, resumable bulk synchronization of remote
//! collections into the local mirror store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine                                 │
//! │                                                                     │
//! │  start/stop/clear/status/counts  ◄── any HTTP surface or CLI        │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌──────────────┐   per-resource session tasks   ┌──────────────┐   │
//! │  │ SyncRegistry │ ◄────── progress/flags ─────── │ drive_session│   │
//! │  │ (state map)  │                                └──────┬───────┘   │
//! │  └──────────────┘                                       │           │
//! │                             ┌───────────────────────────┤           │
//! │                             ▼                           ▼           │
//! │                    ┌────────────────┐          ┌────────────────┐   │
//! │                    │  RemoteSource  │          │  RecordStore   │   │
//! │                    │ (BitrixClient) │          │  (mirror-db)   │   │
//! │                    │  8 concurrent  │          │  transactional │   │
//! │                    │  page fetches  │          │  batch upserts │   │
//! │                    └────────────────┘          └────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - The `SyncEngine` coordinator and session state machine
//! - [`registry`] - Per-resource session state with atomic updates
//! - [`remote`] - `RemoteSource` trait and the REST client
//! - [`config`] - Layered configuration (TOML file, environment)
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mirror_db::{Database, DbConfig};
//! use mirror_sync::{SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new("./mirror.db")).await?;
//! let engine = SyncEngine::from_config(config, db)?;
//!
//! engine.start(mirror_core::ResourceType::Deals).await?;
//! let status = engine.status().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod remote;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{EngineSettings, RemoteSettings, SyncConfig};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use registry::SyncRegistry;
pub use remote::{BitrixClient, RemoteSource};
