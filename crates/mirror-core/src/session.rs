//! # Session State
//!
//! The per-resource state record held by the sync registry. Created with
//! defaults at process start, mutated only through registry operations,
//! never destroyed - only reset in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Outcome
// =============================================================================

/// Terminal state of the most recent session for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The cursor exhausted the remote listing.
    Completed,

    /// A stop request ended the session early.
    Cancelled,

    /// A persistence error (or other hard failure) ended the session.
    Failed,
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::Completed => write!(f, "completed"),
            SessionOutcome::Cancelled => write!(f, "cancelled"),
            SessionOutcome::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Sync session state for one resource type.
///
/// Invariants (enforced by the registry, not by this struct):
/// - `progress <= total` once `total` is known; `total` is a snapshot taken
///   at session start and never refreshed mid-session.
/// - `running` is true for the whole duration of exactly one session.
/// - `stop_requested` can only be set while `running`, and is always reset
///   when the session ends, whatever the outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// True while a session for this resource is active.
    pub running: bool,

    /// Records persisted so far (reflects committed rows, not fetches).
    pub progress: u64,

    /// Remote record count snapshotted at session start.
    pub total: u64,

    /// When the most recent session started.
    pub last_run: Option<DateTime<Utc>>,

    /// Cooperative cancellation flag.
    pub stop_requested: bool,

    /// How the most recent session ended, if one has run.
    pub last_outcome: Option<SessionOutcome>,

    /// Slices abandoned after retry exhaustion during the most recent
    /// session. Non-zero means `progress < total` is a known gap, not a
    /// silent loss.
    pub gap_count: u64,
}

// =============================================================================
// Drift Counts
// =============================================================================

/// Remote vs. local record counts for one resource, independent of any
/// session. Used for drift inspection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceCounts {
    /// Records available at the remote source (0 on a soft-failed probe).
    pub remote: u64,

    /// Records persisted locally.
    pub local: u64,
}
