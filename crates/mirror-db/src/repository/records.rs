//! # Record Store
//!
//! Database operations for mirrored records: local counts, the resume
//! point (highest persisted identifier), idempotent batch upserts, and
//! truncation.
//!
//! ## Upsert Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  upsert_batch(resource, records)                                │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  render each record through the resource's TableMapping         │
//! │       │            │                                            │
//! │       │            └── no parseable id? drop it (debug log)     │
//! │       ▼                                                         │
//! │  BEGIN                                                          │
//! │    INSERT INTO <table> (...) VALUES (...)                       │
//! │      ON CONFLICT(id) DO UPDATE SET <every mapped column>        │
//! │    ... one statement per well-formed record ...                 │
//! │  COMMIT            ── any error rolls the whole batch back      │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  returns rows written (what progress accounting is fed with)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are built at runtime from the mapping tables; sqlx's
//! compile-time macros can't check SQL that is assembled from
//! configuration.

use chrono::Utc;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use mirror_core::{table_mapping, Record, ResourceType, SqlValue, TableMapping};

/// Store for mirrored record tables.
///
/// ## Usage
/// ```rust,ignore
/// let store = db.records();
/// let resume = store.max_id(ResourceType::Deals).await?;
/// let written = store.upsert_batch(ResourceType::Deals, &batch).await?;
/// ```
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Creates a new RecordStore.
    pub fn new(pool: SqlitePool) -> Self {
        RecordStore { pool }
    }

    /// Counts persisted records for a resource.
    pub async fn count(&self, resource: ResourceType) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", resource.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

        debug!(resource = %resource, count, "Local record count");
        Ok(count)
    }

    /// Returns the highest persisted identifier for a resource, or `None`
    /// when its table is empty.
    ///
    /// Identifiers are remote-assigned and monotonic, so this is the
    /// resume low-water mark for the next session.
    pub async fn max_id(&self, resource: ResourceType) -> DbResult<Option<i64>> {
        // Deal and project ids are stored as text; either shape casts.
        let sql = format!(
            "SELECT MAX(CAST(id AS INTEGER)) FROM {}",
            resource.table()
        );
        let max: Option<i64> = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

        debug!(resource = %resource, max_id = ?max, "Local max id");
        Ok(max)
    }

    /// Upserts a batch of records in one transaction.
    ///
    /// Records without a parseable identifier are dropped, not failed.
    /// Inserting an existing identifier overwrites every mapped column.
    /// On any SQL error the transaction rolls back and nothing from the
    /// batch is visible.
    ///
    /// ## Returns
    /// The number of rows actually written - the only number progress
    /// accounting may be advanced by.
    pub async fn upsert_batch(
        &self,
        resource: ResourceType,
        records: &[Record],
    ) -> DbResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mapping = table_mapping(resource);
        let sql = upsert_sql(mapping);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut written = 0usize;
        let mut dropped = 0usize;

        for record in records {
            let Some((id, values)) = mapping.render(record) else {
                dropped += 1;
                continue;
            };

            let mut query = sqlx::query(&sql);
            query = bind_value(query, id);
            for value in values {
                query = bind_value(query, value);
            }
            if mapping.stamp_updated_at {
                query = query.bind(now);
            }

            query.execute(&mut *tx).await?;
            written += 1;
        }

        tx.commit().await?;

        if dropped > 0 {
            debug!(resource = %resource, dropped, "Dropped records without identifiers");
        }
        debug!(resource = %resource, written, "Batch upsert committed");

        Ok(written)
    }

    /// Deletes all persisted records for a resource.
    pub async fn clear(&self, resource: ResourceType) -> DbResult<()> {
        let sql = format!("DELETE FROM {}", resource.table());
        sqlx::query(&sql).execute(&self.pool).await?;

        debug!(resource = %resource, "Table cleared");
        Ok(())
    }
}

// =============================================================================
// SQL Rendering
// =============================================================================

/// Renders the upsert statement for a mapping: every mapped column is
/// written on insert and overwritten on id conflict.
fn upsert_sql(mapping: &TableMapping) -> String {
    let mut columns: Vec<&str> = Vec::with_capacity(mapping.columns.len() + 2);
    columns.push("id");
    columns.extend(mapping.columns.iter().map(|spec| spec.column));
    if mapping.stamp_updated_at {
        columns.push("updated_at");
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = columns[1..]
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        mapping.table(),
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

/// Binds one coerced value onto a query.
fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Real(f) => query.bind(f),
        SqlValue::Bool(b) => query.bind(b),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn deal(id: i64, title: &str, amount: &str) -> Record {
        Record::from_value(json!({
            "ID": id.to_string(),
            "TITLE": title,
            "OPPORTUNITY": amount,
            "STAGE_ID": "NEW"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_count() {
        let db = test_db().await;
        let store = db.records();

        let batch = vec![deal(1, "first", "10"), deal(2, "second", "")];
        let written = store.upsert_batch(ResourceType::Deals, &batch).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(store.count(ResourceType::Deals).await.unwrap(), 2);
        assert_eq!(store.max_id(ResourceType::Deals).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = test_db().await;
        let store = db.records();

        let batch = vec![deal(1, "first", "10"), deal(2, "second", "20")];
        store.upsert_batch(ResourceType::Deals, &batch).await.unwrap();
        store.upsert_batch(ResourceType::Deals, &batch).await.unwrap();

        assert_eq!(store.count(ResourceType::Deals).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_mapped_columns() {
        let db = test_db().await;
        let store = db.records();

        store
            .upsert_batch(ResourceType::Deals, &[deal(1, "before", "10")])
            .await
            .unwrap();
        store
            .upsert_batch(ResourceType::Deals, &[deal(1, "after", "99")])
            .await
            .unwrap();

        let (title, amount): (String, f64) =
            sqlx::query_as("SELECT title, amount FROM deals WHERE id = '1'")
                .fetch_one(db.pool())
                .await
                .unwrap();

        assert_eq!(title, "after");
        assert_eq!(amount, 99.0);
        assert_eq!(store.count(ResourceType::Deals).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_records_dropped() {
        let db = test_db().await;
        let store = db.records();

        let batch = vec![
            deal(1, "ok", "5"),
            Record::from_value(json!({"TITLE": "no id"})).unwrap(),
            Record::from_value(json!({"ID": "not-a-number", "TITLE": "bad id"})).unwrap(),
        ];

        let written = store.upsert_batch(ResourceType::Deals, &batch).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count(ResourceType::Deals).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_task_upsert_with_defaults() {
        let db = test_db().await;
        let store = db.records();

        let task = Record::from_value(json!({
            "id": 41,
            "title": "Review report",
            "multitask": "Y",
            "creator": {"id": "7"},
            "responsible": {"id": 8},
            "auditors": ["1", "2"]
        }))
        .unwrap();

        let written = store.upsert_batch(ResourceType::Tasks, &[task]).await.unwrap();
        assert_eq!(written, 1);

        let (priority, multitask, creator, auditors): (i64, bool, i64, String) = sqlx::query_as(
            "SELECT priority, multitask, creator, auditors FROM tasks WHERE id = 41",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();

        assert_eq!(priority, 1);
        assert!(multitask);
        assert_eq!(creator, 7);
        assert_eq!(auditors, "[\"1\",\"2\"]");
    }

    #[tokio::test]
    async fn test_constraint_violation_rolls_back_batch() {
        let db = test_db().await;
        let store = db.records();

        // Second project is missing NOT NULL columns; the whole batch must
        // roll back, including the valid first row.
        let good = Record::from_value(json!({
            "ID": "1",
            "SUBJECT_ID": "10",
            "NAME": "Apollo",
            "INITIATE_PERMS": "E"
        }))
        .unwrap();
        let bad = Record::from_value(json!({"ID": "2"})).unwrap();

        let err = store
            .upsert_batch(ResourceType::Projects, &[good, bad])
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::ConstraintViolation(_)));
        assert_eq!(store.count(ResourceType::Projects).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let db = test_db().await;
        let store = db.records();

        store
            .upsert_batch(ResourceType::Deals, &[deal(1, "a", "1"), deal(2, "b", "2")])
            .await
            .unwrap();
        store.clear(ResourceType::Deals).await.unwrap();

        assert_eq!(store.count(ResourceType::Deals).await.unwrap(), 0);
        assert_eq!(store.max_id(ResourceType::Deals).await.unwrap(), None);
    }
}
