//! # Records and Pages
//!
//! The engine treats record contents as opaque: a record is a JSON object
//! whose only structurally significant field is its identifier. Everything
//! else is carried through to the store adapter's mapping layer untouched.

use serde_json::{Map, Value};

use crate::resource::ResourceType;

/// Natural identifier of a record, as assigned by the remote source.
///
/// Identifiers arrive either as JSON numbers or as numeric strings; both
/// normalize to `i64` for ordering, deduplication, and resumption.
pub type RecordId = i64;

// =============================================================================
// Record
// =============================================================================

/// One remote record: an opaque field map keyed by a natural identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Wraps a JSON object as a record. Returns `None` for non-objects
    /// (the remote occasionally interleaves scalars into result arrays).
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Record { fields }),
            _ => None,
        }
    }

    /// Borrow the underlying field map.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Fetches a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Extracts and parses this record's identifier for `resource`.
    ///
    /// Returns `None` when the id field is absent or not numeric; such a
    /// record is malformed and is dropped by the store adapter.
    pub fn id(&self, resource: ResourceType) -> Option<RecordId> {
        parse_id(self.fields.get(resource.id_field())?)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Record { fields }
    }
}

/// Parses an identifier value: a JSON integer, or a string holding one.
pub fn parse_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Page
// =============================================================================

/// One fetched page: records in non-decreasing id order plus the source's
/// continuation cursor, threaded through unchanged between calls.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records in this page. Empty on a soft-failed fetch.
    pub records: Vec<Record>,

    /// Offset of the next page, absent when the listing is exhausted
    /// (or the fetch soft-failed).
    pub next_offset: Option<u64>,
}

impl Page {
    /// An empty page with no continuation. What a soft-failed fetch
    /// collapses to.
    pub fn empty() -> Self {
        Page::default()
    }
}
