//! # Repository Module
//!
//! Store implementations for the mirror tables. One store covers every
//! resource type: the per-resource differences (table, columns, coercions)
//! live in mirror-core's mapping tables, so the SQL here is rendered from
//! configuration rather than written per entity.
//!
//! ## Available Stores
//!
//! - [`records::RecordStore`] - counts, resume point, batch upserts, truncation

pub mod records;
