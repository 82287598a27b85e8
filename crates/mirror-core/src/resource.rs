//! # Resource Types
//!
//! The closed set of remote collections being mirrored, together with the
//! per-resource remote metadata the engine and the store need: REST list
//! method, identifier field, result nesting, and local table name.
//!
//! Adding a resource means adding a variant here, a mapping table in
//! [`crate::mapping`], and a migration for its local table.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// =============================================================================
// Resource Type
// =============================================================================

/// One of the fixed collections mirrored from the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// CRM deals (`crm.deal.list`).
    Deals,

    /// Tasks (`tasks.task.list`).
    Tasks,

    /// Workgroups/projects (`sonet_group.get`).
    Projects,
}

impl ResourceType {
    /// Every resource, in a stable order. Used to seed the registry and to
    /// build full status snapshots.
    pub const ALL: [ResourceType; 3] =
        [ResourceType::Deals, ResourceType::Tasks, ResourceType::Projects];

    /// Canonical lowercase name, as used in status maps and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Deals => "deals",
            ResourceType::Tasks => "tasks",
            ResourceType::Projects => "projects",
        }
    }

    /// REST method that lists this resource.
    pub fn list_method(&self) -> &'static str {
        match self {
            ResourceType::Deals => "crm.deal.list",
            ResourceType::Tasks => "tasks.task.list",
            ResourceType::Projects => "sonet_group.get",
        }
    }

    /// Name of the identifier field inside a record payload.
    ///
    /// The tasks API returns camelCase fields; the CRM and workgroup APIs
    /// return uppercase ones.
    pub fn id_field(&self) -> &'static str {
        match self {
            ResourceType::Tasks => "id",
            ResourceType::Deals | ResourceType::Projects => "ID",
        }
    }

    /// Key under `result` that holds the record array, when the API nests
    /// it (`{"result": {"tasks": [...]}}`). `None` means `result` is the
    /// array itself.
    pub fn result_key(&self) -> Option<&'static str> {
        match self {
            ResourceType::Tasks => Some("tasks"),
            ResourceType::Deals | ResourceType::Projects => None,
        }
    }

    /// Whether the listing API reports a `total` field directly.
    ///
    /// The workgroup API does not; its count must be accumulated by paging
    /// with a minimal projection.
    pub fn reports_total(&self) -> bool {
        !matches!(self, ResourceType::Projects)
    }

    /// Whether page fetches must request explicit ascending id order.
    ///
    /// The tasks API does not guarantee id order without it; the others
    /// return non-decreasing ids as-is.
    pub fn needs_id_order(&self) -> bool {
        matches!(self, ResourceType::Tasks)
    }

    /// Local table this resource is persisted into.
    pub fn table(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deals" => Ok(ResourceType::Deals),
            "tasks" => Ok(ResourceType::Tasks),
            "projects" => Ok(ResourceType::Projects),
            other => Err(CoreError::UnknownResource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for resource in ResourceType::ALL {
            let parsed: ResourceType = resource.as_str().parse().unwrap();
            assert_eq!(parsed, resource);
        }
        assert!("invoices".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_remote_metadata() {
        assert_eq!(ResourceType::Deals.list_method(), "crm.deal.list");
        assert_eq!(ResourceType::Tasks.id_field(), "id");
        assert_eq!(ResourceType::Projects.id_field(), "ID");
        assert_eq!(ResourceType::Tasks.result_key(), Some("tasks"));
        assert!(!ResourceType::Projects.reports_total());
        assert!(ResourceType::Tasks.needs_id_order());
    }
}
