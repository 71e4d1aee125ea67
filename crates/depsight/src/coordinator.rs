//! Per-workspace single-flight gate for external scans.
//!
//! At most one scan per workspace root is in flight at a time. Callers that
//! arrive while a scan is pending attach to it and receive exactly its outcome,
//! success or failure.
//!
//! Each scan runs on its own tokio task, so it finishes, publishes its result
//! and clears its entry even when every waiter has gone away. Waiters share the
//! task's outcome through a [`futures::future::Shared`] future and all observe
//! the same cloned result. The entry is removed from the gate *before* the
//! outcome becomes visible to any waiter, so a caller that sees a completed
//! scan can always start a new one.
//!
//! [`ScanCoordinator::cancel`] aborts the task. Every waiter then receives
//! [`ScanError::Cancelled`], as they do if the scan task panics.
//!
//! # Scope
//!
//! Coordination is per process. Two processes serving the same workspace each
//! run their own scans; nothing here is shared across process boundaries.
//!
//! # Lock Ordering
//!
//! The gate's mutex is held while the `start` closure passed to
//! [`ScanCoordinator::acquire`] runs. That closure may take the graph store's
//! lock, so the store must never call into the coordinator while holding its
//! own lock. A finishing scan task takes the gate only after it has released
//! the store. No lock is held across an `.await`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, info};

use crate::error::ScanError;
use crate::model::GraphSnapshot;

/// What every waiter of a scan receives.
pub type ScanOutcome = Result<Arc<GraphSnapshot>, ScanError>;

type PendingMap = Arc<Mutex<HashMap<PathBuf, PendingScan>>>;

/// A handle on an in-flight scan. Cloning it adds another waiter.
#[derive(Clone)]
pub struct PendingScan {
    workspace_root: PathBuf,
    future: Shared<BoxFuture<'static, ScanOutcome>>,
    abort: AbortHandle,
}

impl PendingScan {
    /// The workspace this scan belongs to.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Wait for the scan to finish.
    pub async fn wait(self) -> ScanOutcome {
        self.future.await
    }
}

impl std::fmt::Debug for PendingScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingScan")
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}

/// Result of [`ScanCoordinator::acquire`].
#[derive(Debug, Clone)]
pub enum ScanTicket {
    /// A scan was already running; the caller is attached to it.
    AlreadyPending(PendingScan),
    /// No scan was running; the caller's scan is now the pending one.
    StartedNew(PendingScan),
}

impl ScanTicket {
    /// Returns `true` if this call started the scan.
    #[must_use]
    pub fn started_new(&self) -> bool {
        matches!(self, Self::StartedNew(_))
    }

    /// The pending scan, regardless of who started it.
    #[must_use]
    pub fn into_pending(self) -> PendingScan {
        match self {
            Self::AlreadyPending(pending) | Self::StartedNew(pending) => pending,
        }
    }
}

/// Single-flight gate keyed by workspace root.
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    pending: PendingMap,
}

impl ScanCoordinator {
    /// Create an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the pending scan for `workspace_root`, or start one.
    ///
    /// `start` is called only when nothing is pending, and while the gate is
    /// held, so two callers can never both start a scan for the same root. The
    /// scan is spawned right away and runs to completion whether or not anyone
    /// waits for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn acquire<F>(&self, workspace_root: &Path, start: F) -> ScanTicket
    where
        F: FnOnce() -> BoxFuture<'static, ScanOutcome>,
    {
        let mut pending = lock(&self.pending);

        if let Some(existing) = pending.get(workspace_root) {
            debug!(workspace = %workspace_root.display(), "Attaching to pending scan");
            return ScanTicket::AlreadyPending(existing.clone());
        }

        let scan = start();
        let clear = ClearOnDrop {
            registry: Arc::clone(&self.pending),
            key: workspace_root.to_path_buf(),
        };
        // The guard lives inside the task, so completion, panic and abort all
        // clear the entry before the join handle resolves.
        let task = tokio::spawn(async move {
            let _clear = clear;
            scan.await
        });
        let abort = task.abort_handle();
        let future = async move { task.await.unwrap_or_else(|e| Err(cancelled(&e))) }
            .boxed()
            .shared();

        let handle = PendingScan {
            workspace_root: workspace_root.to_path_buf(),
            future,
            abort,
        };
        pending.insert(workspace_root.to_path_buf(), handle.clone());
        debug!(workspace = %workspace_root.display(), "Registered new pending scan");

        ScanTicket::StartedNew(handle)
    }

    /// Abort the pending scan for `workspace_root`.
    ///
    /// Every waiter receives [`ScanError::Cancelled`]. Returns `false` if no
    /// scan was pending.
    pub fn cancel(&self, workspace_root: &Path) -> bool {
        let abort = lock(&self.pending)
            .get(workspace_root)
            .map(|pending| pending.abort.clone());

        match abort {
            Some(abort) => {
                abort.abort();
                info!(workspace = %workspace_root.display(), "Cancelled pending scan");
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a scan is pending for `workspace_root`.
    #[must_use]
    pub fn is_pending(&self, workspace_root: &Path) -> bool {
        lock(&self.pending).contains_key(workspace_root)
    }

    /// Number of workspaces with a pending scan.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// Removes a scan's entry from the gate when the scan task ends, however it ends.
struct ClearOnDrop {
    registry: PendingMap,
    key: PathBuf,
}

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.key);
    }
}

fn cancelled(error: &JoinError) -> ScanError {
    if error.is_cancelled() {
        ScanError::Cancelled("scan was aborted".to_string())
    } else {
        ScanError::Cancelled(format!("scan task failed: {error}"))
    }
}

/// The map is only ever changed by a single insert or remove, so a panic in
/// another holder cannot leave it half-updated.
fn lock(map: &Mutex<HashMap<PathBuf, PendingScan>>) -> MutexGuard<'_, HashMap<PathBuf, PendingScan>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}
