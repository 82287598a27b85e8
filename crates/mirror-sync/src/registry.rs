//! # Sync Registry
//!
//! Process-wide session state, one [`SessionState`] per resource type.
//! All reads and writes go through the operations below; there is no
//! ambient mutable state. Readers always observe a consistent entry -
//! snapshots are cloned under the lock, never assembled field by field.
//!
//! Nothing here is persisted. After a restart every resource is idle
//! again, and the next session resumes from the store's highest persisted
//! identifier, so only the in-memory "it was running" flag is lost.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use mirror_core::{ResourceType, SessionOutcome, SessionState};

use crate::error::{SyncError, SyncResult};

/// Registry of per-resource sync session state.
#[derive(Clone, Default)]
pub struct SyncRegistry {
    inner: Arc<RwLock<HashMap<ResourceType, SessionState>>>,
}

impl SyncRegistry {
    /// Creates a registry with a default (idle) entry for every resource.
    pub fn new() -> Self {
        let mut map = HashMap::new();
        for resource in ResourceType::ALL {
            map.insert(resource, SessionState::default());
        }

        SyncRegistry {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Point-in-time snapshot of every resource's state.
    pub async fn snapshot(&self) -> HashMap<ResourceType, SessionState> {
        self.inner.read().await.clone()
    }

    /// Current state for one resource.
    pub async fn get(&self, resource: ResourceType) -> SessionState {
        self.inner
            .read()
            .await
            .get(&resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a session is active for `resource`.
    pub async fn is_running(&self, resource: ResourceType) -> bool {
        self.get(resource).await.running
    }

    /// Whether cancellation has been requested for `resource`.
    pub async fn stop_requested(&self, resource: ResourceType) -> bool {
        self.get(resource).await.stop_requested
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Attempts the `Idle -> Running` transition.
    ///
    /// Atomic with respect to concurrent starters: exactly one caller gets
    /// `true` and owns the session. On success the entry is reset for a
    /// fresh run (`last_run` stamped, counters zeroed, stop flag cleared).
    pub async fn try_begin(&self, resource: ResourceType) -> bool {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();

        if state.running {
            return false;
        }

        state.running = true;
        state.stop_requested = false;
        state.last_run = Some(Utc::now());
        state.progress = 0;
        state.total = 0;
        state.gap_count = 0;
        state.last_outcome = None;
        true
    }

    /// Records the remote total snapshot for the active session.
    pub async fn set_total(&self, resource: ResourceType, total: u64) {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();
        state.total = total;
        state.progress = state.progress.min(total);
    }

    /// Sets the absolute progress counter, clamped to the total snapshot.
    pub async fn set_progress(&self, resource: ResourceType, progress: u64) {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();
        state.progress = progress.min(state.total);
    }

    /// Advances progress by `persisted` rows, clamped to the total
    /// snapshot. Callers pass the count of rows actually committed.
    pub async fn add_progress(&self, resource: ResourceType, persisted: u64) {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();
        state.progress = state.progress.saturating_add(persisted).min(state.total);
    }

    /// Records one abandoned slice.
    pub async fn record_gap(&self, resource: ResourceType) {
        let mut map = self.inner.write().await;
        map.entry(resource).or_default().gap_count += 1;
    }

    /// Requests cooperative cancellation of the active session.
    ///
    /// ## Errors
    /// `SessionNotRunning` when no session is active; the stop flag can
    /// only be raised while `running` is true.
    pub async fn request_stop(&self, resource: ResourceType) -> SyncResult<()> {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();

        if !state.running {
            return Err(SyncError::SessionNotRunning { resource });
        }

        state.stop_requested = true;
        Ok(())
    }

    /// Terminal transition back to idle. The only path that lowers
    /// `running`, and it always clears the stop flag, whatever the
    /// outcome.
    pub async fn finish(&self, resource: ResourceType, outcome: SessionOutcome) {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();
        state.running = false;
        state.stop_requested = false;
        state.last_outcome = Some(outcome);
    }

    /// Resets the progress counter after a table truncation.
    pub async fn reset_progress(&self, resource: ResourceType) {
        let mut map = self.inner.write().await;
        let state = map.entry(resource).or_default();
        state.progress = 0;
        state.total = 0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
