//! # Field Mapping
//!
//! Per-resource mapping from remote record fields to local table columns,
//! expressed as static tables of [`ColumnSpec`]s. The store adapter renders
//! these into upsert statements; nothing in here touches a database.
//!
//! The rules are fixed per resource type and preserved exactly for schema
//! compatibility:
//! - tasks use camelCase source fields, coerce `Y`/`N` flags to booleans,
//!   flatten `creator.id`/`responsible.id`, and serialize list/object
//!   sub-fields to JSON text;
//! - deals and projects use uppercase source fields and keep their `Y`/`N`
//!   columns as text (the schema CHECK constraints expect it);
//! - absent numeric/text fields fall back to per-column defaults where the
//!   schema declares one.

use serde_json::Value;

use crate::record::{parse_id, Record};
use crate::resource::ResourceType;

// =============================================================================
// Sql Value
// =============================================================================

/// A coerced column value, ready for the store adapter to bind.
///
/// Backend-neutral on purpose: mirror-core does not depend on any database
/// crate.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
}

// =============================================================================
// Field Kinds
// =============================================================================

/// How a remote field is coerced into its column value.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// String (or stringified number) passthrough; absent -> NULL.
    Text,

    /// Like [`FieldKind::Text`], but absent/unusable falls back to a default.
    TextOr(&'static str),

    /// Integer from a number or numeric string; absent -> NULL.
    Integer,

    /// Like [`FieldKind::Integer`], with a default.
    IntegerOr(i64),

    /// Float from a number or numeric string; absent -> NULL.
    Real,

    /// Like [`FieldKind::Real`], with a default. An empty string also
    /// falls back (the CRM API sends `""` for unset amounts).
    RealOr(f64),

    /// Two-valued `"Y"`/`"N"` flag coerced to a boolean; anything that is
    /// not `"Y"` (including absence) is false.
    YesNo,

    /// Remote timestamp string, stored verbatim; absent -> NULL.
    Timestamp,

    /// Nested list/object serialized to JSON text; absent falls back to the
    /// given JSON literal (`"[]"` or `"{}"`).
    Json(&'static str),

    /// Object field flattened to the numeric id under the given key;
    /// absent or unparseable -> 0.
    NestedId(&'static str),
}

impl FieldKind {
    /// Coerces a raw field value (or its absence) to a column value.
    pub fn coerce(&self, value: Option<&Value>) -> SqlValue {
        // JSON null is indistinguishable from an absent field here.
        let value = value.filter(|v| !v.is_null());

        match self {
            FieldKind::Text => text_of(value).map(SqlValue::Text).unwrap_or(SqlValue::Null),
            FieldKind::TextOr(default) => SqlValue::Text(
                text_of(value).unwrap_or_else(|| (*default).to_string()),
            ),
            FieldKind::Integer => int_of(value).map(SqlValue::Int).unwrap_or(SqlValue::Null),
            FieldKind::IntegerOr(default) => SqlValue::Int(int_of(value).unwrap_or(*default)),
            FieldKind::Real => real_of(value).map(SqlValue::Real).unwrap_or(SqlValue::Null),
            FieldKind::RealOr(default) => SqlValue::Real(real_of(value).unwrap_or(*default)),
            FieldKind::YesNo => {
                SqlValue::Bool(matches!(value, Some(Value::String(s)) if s == "Y"))
            }
            FieldKind::Timestamp => {
                text_of(value).map(SqlValue::Text).unwrap_or(SqlValue::Null)
            }
            FieldKind::Json(default) => match value {
                Some(v) => SqlValue::Text(
                    serde_json::to_string(v).unwrap_or_else(|_| (*default).to_string()),
                ),
                None => SqlValue::Text((*default).to_string()),
            },
            FieldKind::NestedId(key) => {
                let id = value
                    .and_then(|v| v.as_object())
                    .and_then(|obj| obj.get(*key))
                    .and_then(parse_id)
                    .unwrap_or(0);
                SqlValue::Int(id)
            }
        }
    }
}

fn text_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_of(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn real_of(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Table Mapping
// =============================================================================

/// How the identifier column is stored locally.
///
/// The CRM and workgroup tables keep the remote's string ids; the tasks
/// table stores them as integers. Resume logic casts either to an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Text,
    Integer,
}

/// One mapped column: local name, remote source field, coercion rule.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub column: &'static str,
    pub source: &'static str,
    pub kind: FieldKind,
}

/// Complete mapping for one resource's table.
#[derive(Debug, Clone, Copy)]
pub struct TableMapping {
    pub resource: ResourceType,
    pub id_kind: IdKind,
    pub columns: &'static [ColumnSpec],

    /// Whether the table carries an `updated_at` column stamped by the
    /// store at write time.
    pub stamp_updated_at: bool,
}

impl TableMapping {
    /// Local table name.
    pub fn table(&self) -> &'static str {
        self.resource.table()
    }

    /// Renders a record into `(id value, mapped column values)`.
    ///
    /// Returns `None` when the record has no parseable identifier; such
    /// records are dropped rather than failing the batch.
    pub fn render(&self, record: &Record) -> Option<(SqlValue, Vec<SqlValue>)> {
        let id = record.id(self.resource)?;

        let id_value = match self.id_kind {
            IdKind::Text => SqlValue::Text(id.to_string()),
            IdKind::Integer => SqlValue::Int(id),
        };

        let values = self
            .columns
            .iter()
            .map(|spec| spec.kind.coerce(record.get(spec.source)))
            .collect();

        Some((id_value, values))
    }
}

/// Looks up the mapping for a resource.
pub fn table_mapping(resource: ResourceType) -> &'static TableMapping {
    match resource {
        ResourceType::Deals => &DEALS,
        ResourceType::Tasks => &TASKS,
        ResourceType::Projects => &PROJECTS,
    }
}

// Shorthand for the column tables below.
const fn col(column: &'static str, source: &'static str, kind: FieldKind) -> ColumnSpec {
    ColumnSpec { column, source, kind }
}

// =============================================================================
// Deals
// =============================================================================

static DEALS: TableMapping = TableMapping {
    resource: ResourceType::Deals,
    id_kind: IdKind::Text,
    stamp_updated_at: true,
    columns: &[
        col("title", "TITLE", FieldKind::Text),
        col("amount", "OPPORTUNITY", FieldKind::RealOr(0.0)),
        col("status", "STAGE_ID", FieldKind::Text),
    ],
};

// =============================================================================
// Tasks
// =============================================================================

static TASKS: TableMapping = TableMapping {
    resource: ResourceType::Tasks,
    id_kind: IdKind::Integer,
    stamp_updated_at: false,
    columns: &[
        col("parent_id", "parentId", FieldKind::Integer),
        col("title", "title", FieldKind::TextOr("")),
        col("description", "description", FieldKind::Text),
        col("mark", "mark", FieldKind::Text),
        col("priority", "priority", FieldKind::IntegerOr(1)),
        col("multitask", "multitask", FieldKind::YesNo),
        col("not_viewed", "notViewed", FieldKind::YesNo),
        col("replicate", "replicate", FieldKind::YesNo),
        col("stage_id", "stageId", FieldKind::IntegerOr(0)),
        col("created_by", "createdBy", FieldKind::IntegerOr(0)),
        col("created_date", "createdDate", FieldKind::Timestamp),
        col("responsible_id", "responsibleId", FieldKind::IntegerOr(0)),
        col("changed_by", "changedBy", FieldKind::IntegerOr(0)),
        col("changed_date", "changedDate", FieldKind::Timestamp),
        col("status_changed_by", "statusChangedBy", FieldKind::IntegerOr(0)),
        col("closed_by", "closedBy", FieldKind::Integer),
        col("closed_date", "closedDate", FieldKind::Timestamp),
        col("activity_date", "activityDate", FieldKind::Timestamp),
        col("date_start", "dateStart", FieldKind::Timestamp),
        col("deadline", "deadline", FieldKind::Timestamp),
        col("start_date_plan", "startDatePlan", FieldKind::Timestamp),
        col("end_date_plan", "endDatePlan", FieldKind::Timestamp),
        col("guid", "guid", FieldKind::Text),
        col("xml_id", "xmlId", FieldKind::Text),
        col("comments_count", "commentsCount", FieldKind::Integer),
        col("service_comments_count", "serviceCommentsCount", FieldKind::Integer),
        col("allow_change_deadline", "allowChangeDeadline", FieldKind::YesNo),
        col("allow_time_tracking", "allowTimeTracking", FieldKind::YesNo),
        col("task_control", "taskControl", FieldKind::YesNo),
        col("add_in_report", "addInReport", FieldKind::YesNo),
        col("forked_by_template_id", "forkedByTemplateId", FieldKind::Integer),
        col("time_estimate", "timeEstimate", FieldKind::IntegerOr(0)),
        col("time_spent_in_logs", "timeSpentInLogs", FieldKind::Integer),
        col("match_work_time", "matchWorkTime", FieldKind::YesNo),
        col("forum_topic_id", "forumTopicId", FieldKind::Integer),
        col("forum_id", "forumId", FieldKind::Integer),
        col("site_id", "siteId", FieldKind::Text),
        col("subordinate", "subordinate", FieldKind::YesNo),
        col("exchange_modified", "exchangeModified", FieldKind::Timestamp),
        col("exchange_id", "exchangeId", FieldKind::Integer),
        col("outlook_version", "outlookVersion", FieldKind::Integer),
        col("viewed_date", "viewedDate", FieldKind::Timestamp),
        col("sorting", "sorting", FieldKind::Real),
        col("duration_plan", "durationPlan", FieldKind::Integer),
        col("duration_fact", "durationFact", FieldKind::Integer),
        col("duration_type", "durationType", FieldKind::TextOr("days")),
        col("is_muted", "isMuted", FieldKind::YesNo),
        col("is_pinned", "isPinned", FieldKind::YesNo),
        col("is_pinned_in_group", "isPinnedInGroup", FieldKind::YesNo),
        col("flow_id", "flowId", FieldKind::Integer),
        col("description_in_bbcode", "descriptionInBbcode", FieldKind::YesNo),
        col("status", "status", FieldKind::IntegerOr(2)),
        col("status_changed_date", "statusChangedDate", FieldKind::Timestamp),
        col("favorite", "favorite", FieldKind::YesNo),
        col("group_id", "groupId", FieldKind::IntegerOr(0)),
        col("auditors", "auditors", FieldKind::Json("[]")),
        col("accomplices", "accomplices", FieldKind::Json("[]")),
        col("new_comments_count", "newCommentsCount", FieldKind::IntegerOr(0)),
        col("task_group", "group", FieldKind::Json("[]")),
        col("creator", "creator", FieldKind::NestedId("id")),
        col("responsible", "responsible", FieldKind::NestedId("id")),
        col("accomplices_data", "accomplicesData", FieldKind::Json("[]")),
        col("auditors_data", "auditorsData", FieldKind::Json("[]")),
        col("sub_status", "subStatus", FieldKind::IntegerOr(0)),
    ],
};

// =============================================================================
// Projects
// =============================================================================

// subject_id, name, and initiate_perms are NOT NULL in the schema with no
// default; a record missing them fails the batch at commit, which surfaces
// as a persistence error rather than a silent drop.
static PROJECTS: TableMapping = TableMapping {
    resource: ResourceType::Projects,
    id_kind: IdKind::Text,
    stamp_updated_at: true,
    columns: &[
        col("active", "ACTIVE", FieldKind::Text),
        col("subject_id", "SUBJECT_ID", FieldKind::Text),
        col("subject_data", "SUBJECT_DATA", FieldKind::Json("{}")),
        col("name", "NAME", FieldKind::Text),
        col("description", "DESCRIPTION", FieldKind::Text),
        col("keywords", "KEYWORDS", FieldKind::Text),
        col("closed", "CLOSED", FieldKind::Text),
        col("visible", "VISIBLE", FieldKind::Text),
        col("opened", "OPENED", FieldKind::Text),
        col("project", "PROJECT", FieldKind::Text),
        col("landing", "LANDING", FieldKind::Text),
        col("date_create", "DATE_CREATE", FieldKind::Timestamp),
        col("date_update", "DATE_UPDATE", FieldKind::Timestamp),
        col("date_activity", "DATE_ACTIVITY", FieldKind::Timestamp),
        col("image_id", "IMAGE_ID", FieldKind::Text),
        col("avatar", "AVATAR", FieldKind::Text),
        col("avatar_types", "AVATAR_TYPES", FieldKind::Json("{}")),
        col("avatar_type", "AVATAR_TYPE", FieldKind::Text),
        col("owner_id", "OWNER_ID", FieldKind::Text),
        col("owner_data", "OWNER_DATA", FieldKind::Json("{}")),
        col("number_of_members", "NUMBER_OF_MEMBERS", FieldKind::Integer),
        col("number_of_moderators", "NUMBER_OF_MODERATORS", FieldKind::Integer),
        col("initiate_perms", "INITIATE_PERMS", FieldKind::Text),
        col("project_date_start", "PROJECT_DATE_START", FieldKind::Timestamp),
        col("project_date_finish", "PROJECT_DATE_FINISH", FieldKind::Timestamp),
        col("scrum_owner_id", "SCRUM_OWNER_ID", FieldKind::Text),
        col("scrum_master_id", "SCRUM_MASTER_ID", FieldKind::Text),
        col("scrum_sprint_duration", "SCRUM_SPRINT_DURATION", FieldKind::Integer),
        col("scrum_task_responsible", "SCRUM_TASK_RESPONSIBLE", FieldKind::Text),
        col("tags", "TAGS", FieldKind::Text),
        col("actions", "ACTIONS", FieldKind::Json("{}")),
        col("user_data", "USER_DATA", FieldKind::Json("{}")),
    ],
};

// =============================================================================
// Unit Tests
// =============================================================================
