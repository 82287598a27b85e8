//! # Sync Engine
//!
//! The coordinator: drives one sync session per resource type through its
//! state machine, fanning out bounded concurrent page fetches and keeping
//! the progress counter consistent with what is actually persisted.
//!
//! ## Session State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │   Idle ──start()──► Running ──► { Completed, Cancelled, Failed }    │
//! │    ▲                                        │                       │
//! │    └────────────── registry.finish() ◄──────┘  (always runs)        │
//! │                                                                     │
//! │  Running, each round:                                               │
//! │    1. spawn up to max_workers fetches at start + i*batch_size       │
//! │       (skipping offsets past the total snapshot)                    │
//! │    2. drain completions in arrival order                            │
//! │         - stop requested? abandon the round, discard the rest       │
//! │         - append records to the pending batch                       │
//! │         - flush at 2*batch_size, or when a page has no continuation │
//! │         - progress += rows committed (not rows fetched)             │
//! │    3. advance the cursor to the largest continuation observed;      │
//! │       never backwards. A cursor that stops moving is retried a      │
//! │       bounded number of rounds, then abandoned as an explicit gap.  │
//! │    4. exit when nothing was dispatched, the listing exhausted       │
//! │       itself, or progress reached the total snapshot                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fetches are the dominant latency cost, so they run in parallel;
//! persistence stays serialized through the store so upserts remain
//! transactionally simple and progress accounting exact.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use mirror_core::{Record, ResourceCounts, ResourceType, SessionOutcome, SessionState};
use mirror_db::Database;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::registry::SyncRegistry;
use crate::remote::{BitrixClient, RemoteSource};

// =============================================================================
// Sync Engine
// =============================================================================

/// The sync coordinator. Cheap to clone; clones share the registry and
/// session tasks.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: SyncConfig,
    db: Database,
    remote: Arc<dyn RemoteSource>,
    registry: SyncRegistry,

    /// Supervised session tasks, one per resource at most.
    sessions: Mutex<HashMap<ResourceType, JoinHandle<()>>>,
}

impl SyncEngine {
    /// Creates an engine over an explicit remote source.
    pub fn new(config: SyncConfig, db: Database, remote: Arc<dyn RemoteSource>) -> Self {
        SyncEngine {
            inner: Arc::new(EngineInner {
                config,
                db,
                remote,
                registry: SyncRegistry::new(),
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates an engine with a [`BitrixClient`] built from the config.
    pub fn from_config(config: SyncConfig, db: Database) -> SyncResult<Self> {
        let client = BitrixClient::new(&config)?;
        Ok(Self::new(config, db, Arc::new(client)))
    }

    // =========================================================================
    // Public Operations
    // =========================================================================

    /// Begins a sync session for `resource` on a background task.
    ///
    /// ## Errors
    /// `SessionAlreadyRunning` when a session for this resource is active;
    /// no state is mutated in that case.
    pub async fn start(&self, resource: ResourceType) -> SyncResult<()> {
        if !self.inner.registry.try_begin(resource).await {
            return Err(SyncError::SessionAlreadyRunning { resource });
        }

        info!(resource = %resource, "Starting sync session");

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            run_session(inner, resource).await;
        });
        self.inner.sessions.lock().await.insert(resource, handle);

        Ok(())
    }

    /// Requests cooperative cancellation of the active session.
    ///
    /// Not preemptive: fetches already in flight are left to finish and
    /// their results discarded, and the pending partial batch is dropped,
    /// not flushed.
    pub async fn request_stop(&self, resource: ResourceType) -> SyncResult<()> {
        self.inner.registry.request_stop(resource).await?;
        info!(resource = %resource, "Stop requested");
        Ok(())
    }

    /// Truncates the persisted records for `resource` and resets its
    /// progress counter.
    ///
    /// ## Errors
    /// `SessionActive` while a session for this resource is running.
    pub async fn clear(&self, resource: ResourceType) -> SyncResult<()> {
        if self.inner.registry.is_running(resource).await {
            return Err(SyncError::SessionActive { resource });
        }

        self.inner.db.records().clear(resource).await?;
        self.inner.registry.reset_progress(resource).await;

        info!(resource = %resource, "Cleared persisted records");
        Ok(())
    }

    /// Point-in-time snapshot of every resource's session state.
    pub async fn status(&self) -> HashMap<ResourceType, SessionState> {
        self.inner.registry.snapshot().await
    }

    /// Remote vs. local record counts, independent of session state.
    pub async fn counts(&self, resource: ResourceType) -> SyncResult<ResourceCounts> {
        let remote = self.inner.remote.count(resource).await;
        let local = self.inner.db.records().count(resource).await? as u64;

        Ok(ResourceCounts { remote, local })
    }

    /// Waits for the active session for `resource` (if any) to reach its
    /// terminal state.
    pub async fn join(&self, resource: ResourceType) {
        let handle = self.inner.sessions.lock().await.remove(&resource);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

// =============================================================================
// Session Task
// =============================================================================

/// Runs one session to its terminal state.
///
/// The terminal transition is unconditional: whatever `drive_session`
/// returns - including a hard store error - `finish` runs and the resource
/// goes back to idle with the stop flag cleared.
async fn run_session(inner: Arc<EngineInner>, resource: ResourceType) {
    let outcome = match drive_session(&inner, resource).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(resource = %resource, error = %e, "Sync session failed");
            SessionOutcome::Failed
        }
    };

    inner.registry.finish(resource, outcome).await;

    let state = inner.registry.get(resource).await;
    info!(
        resource = %resource,
        outcome = %outcome,
        progress = state.progress,
        total = state.total,
        gaps = state.gap_count,
        "Sync session ended"
    );
}

/// The main loop. Returns the terminal outcome for soft endings; hard
/// failures propagate as errors and become `Failed` in the caller.
async fn drive_session(
    inner: &Arc<EngineInner>,
    resource: ResourceType,
) -> SyncResult<SessionOutcome> {
    let store = inner.db.records();
    let batch_size = inner.config.engine.batch_size as u64;
    let max_workers = inner.config.engine.max_workers;
    let flush_threshold = inner.config.engine.flush_threshold();

    // Total is a snapshot for the whole session, even if the remote count
    // changes while we run.
    let total = inner.remote.count(resource).await;
    inner.registry.set_total(resource, total).await;

    // Resume point: highest persisted identifier, fixed for the session.
    // The filter semantics are "strictly greater than the original resume
    // point", so it is not advanced as pages come in.
    let since_id = store.max_id(resource).await?;
    if let Some(id) = since_id {
        let local = store.count(resource).await? as u64;
        info!(resource = %resource, since_id = id, local, total, "Resuming sync");
        inner.registry.set_progress(resource, local).await;
    } else {
        info!(resource = %resource, total, "Starting sync from scratch");
    }

    let mut start: u64 = 0;
    let mut pending: Vec<Record> = Vec::new();
    let mut dry_rounds: u32 = 0;

    loop {
        if inner.registry.get(resource).await.progress >= total {
            break;
        }
        if inner.registry.stop_requested(resource).await {
            return Ok(SessionOutcome::Cancelled);
        }

        // Dispatch one round of fetches at distinct offsets. Spawned as
        // tasks so an abandoned round detaches them instead of aborting.
        let mut in_flight = FuturesUnordered::new();
        let mut dispatched = 0usize;
        for i in 0..max_workers {
            let offset = start + i as u64 * batch_size;
            if offset >= total {
                break;
            }

            let remote = inner.remote.clone();
            in_flight.push(tokio::spawn(async move {
                remote
                    .fetch_page(resource, offset, batch_size as usize, since_id)
                    .await
            }));
            dispatched += 1;
        }

        // The cursor has passed the total snapshot.
        if dispatched == 0 {
            break;
        }

        debug!(resource = %resource, start, dispatched, "Dispatched fetch round");

        // Drain in completion order, not dispatch order.
        let mut max_next: Option<u64> = None;
        let mut round_records = 0usize;
        let mut cancelled = false;

        while let Some(joined) = in_flight.next().await {
            if inner.registry.stop_requested(resource).await {
                cancelled = true;
                break;
            }

            let page = match joined {
                Ok(page) => page,
                Err(e) => {
                    warn!(resource = %resource, error = %e, "Fetch task died, treating as empty page");
                    continue;
                }
            };

            round_records += page.records.len();
            if let Some(next) = page.next_offset {
                max_next = Some(max_next.map_or(next, |m| m.max(next)));
            }

            if page.records.is_empty() {
                continue;
            }

            let exhausted = page.next_offset.is_none();
            pending.extend(page.records);

            if pending.len() >= flush_threshold || exhausted {
                let written = store.upsert_batch(resource, &pending).await?;
                inner.registry.add_progress(resource, written as u64).await;
                debug!(resource = %resource, written, "Flushed batch");
                pending.clear();
            }
        }

        // Dropping the set detaches any still-running fetches; their
        // results are discarded rather than awaited.
        drop(in_flight);

        if cancelled {
            info!(resource = %resource, "Sync stopped by request, discarding pending batch");
            return Ok(SessionOutcome::Cancelled);
        }

        // Cursor advancement: monotonic and failure-aware. `start` never
        // moves backwards; a cursor that stops moving gets a bounded
        // number of retry rounds before its slice is abandoned as a gap.
        match max_next {
            Some(next) if next > start => {
                start = next;
                dry_rounds = 0;
            }
            Some(_) => {
                dry_rounds += 1;
                if dry_rounds >= inner.config.engine.slice_retry_limit {
                    abandon_slice(inner, resource, &mut start, batch_size).await;
                    dry_rounds = 0;
                }
            }
            None if round_records == 0 => {
                dry_rounds += 1;
                if dry_rounds >= inner.config.engine.slice_retry_limit {
                    abandon_slice(inner, resource, &mut start, batch_size).await;
                    dry_rounds = 0;
                }
            }
            // Records arrived with no continuation anywhere: the listing
            // is exhausted.
            None => break,
        }
    }

    // Natural exit: flush whatever is still pending. (Cancellation
    // returned above and deliberately dropped it.)
    if !pending.is_empty() {
        let written = store.upsert_batch(resource, &pending).await?;
        inner.registry.add_progress(resource, written as u64).await;
        debug!(resource = %resource, written, "Flushed final batch");
    }

    Ok(SessionOutcome::Completed)
}

/// Gives up on the slice at `start`: records an explicit gap and moves the
/// cursor one slice forward so the session cannot stall.
async fn abandon_slice(
    inner: &Arc<EngineInner>,
    resource: ResourceType,
    start: &mut u64,
    batch_size: u64,
) {
    warn!(
        resource = %resource,
        offset = *start,
        "Abandoning slice after repeated dry rounds, recording gap"
    );
    inner.registry.record_gap(resource).await;
    *start += batch_size;
}

// =============================================================================
// Unit Tests
// =============================================================================
