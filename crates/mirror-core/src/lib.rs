//! # mirror-core: Pure Domain Types for bx-mirror
//!
//! This crate is the foundation of the mirror workspace. It defines the
//! closed set of resource types being mirrored, the opaque record model,
//! the per-resource field-mapping tables, and the session state held by
//! the sync registry.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      bx-mirror workspace                        │
//! │                                                                 │
//! │   ┌──────────────────────────────────────────────────────────┐  │
//! │   │               mirror-core (THIS CRATE)                   │  │
//! │   │                                                          │  │
//! │   │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌────────────┐  │  │
//! │   │  │ resource │ │  record  │ │ mapping  │ │  session   │  │  │
//! │   │  │ Resource │ │  Record  │ │ Column   │ │ Session    │  │  │
//! │   │  │ Type     │ │  Page    │ │ specs    │ │ State      │  │  │
//! │   │  └──────────┘ └──────────┘ └──────────┘ └────────────┘  │  │
//! │   │                                                          │  │
//! │   │  NO I/O - NO DATABASE - NO NETWORK - PURE FUNCTIONS      │  │
//! │   └──────────────────────────────────────────────────────────┘  │
//! │            ▲                                ▲                   │
//! │            │                                │                   │
//! │      mirror-db (store adapter)       mirror-sync (engine)       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`resource`] - `ResourceType` and per-resource remote metadata
//! - [`record`] - Opaque `Record` payloads and fetched `Page`s
//! - [`mapping`] - Field-mapping tables and value coercion
//! - [`session`] - Per-resource sync session state
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod mapping;
pub mod record;
pub mod resource;
pub mod session;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::CoreError;
pub use mapping::{table_mapping, ColumnSpec, FieldKind, IdKind, SqlValue, TableMapping};
pub use record::{Page, Record, RecordId};
pub use resource::ResourceType;
pub use session::{ResourceCounts, SessionOutcome, SessionState};
