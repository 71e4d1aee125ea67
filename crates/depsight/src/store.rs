//! Per-workspace snapshot store.
//!
//! [`GraphStore`] owns the latest [`GraphSnapshot`] for each workspace root and
//! is the only place a snapshot is replaced. Loading goes through three steps:
//!
//! 1. Validate the cached snapshot against key-file modification times.
//! 2. On a miss, join or start the single scan for that root via the
//!    [`ScanCoordinator`].
//! 3. The scan builds a new snapshot, swaps it into the store, and only then
//!    releases the pending entry.
//!
//! A failed, timed-out or cancelled scan leaves the previous snapshot in
//! place. A scan whose callers all gave up still completes and stores its
//! snapshot.
//!
//! Snapshots are keyed by workspace root only. Scanning a sub-directory
//! replaces the snapshot for its root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tracing::{debug, info, warn};

use crate::cache::{self, KeyFileProbe};
use crate::coordinator::{ScanCoordinator, ScanOutcome};
use crate::error::{Result, ScanError};
use crate::model::{GraphSnapshot, SnapshotMetadata};
use crate::scanner::Scanner;

type SnapshotMap = Arc<RwLock<HashMap<PathBuf, Arc<GraphSnapshot>>>>;

/// A snapshot handed back by [`GraphStore::load_graph`].
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    /// The snapshot.
    pub snapshot: Arc<GraphSnapshot>,
    /// `true` if the cached snapshot was reused without waiting on a scan.
    pub from_cache: bool,
}

/// Latest snapshot per workspace root, refreshed through a single-flight scan.
pub struct GraphStore {
    snapshots: SnapshotMap,
    coordinator: ScanCoordinator,
    scanner: Arc<dyn Scanner>,
    probe: Arc<dyn KeyFileProbe>,
    scan_timeout: Duration,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("coordinator", &self.coordinator)
            .field("scan_timeout", &self.scan_timeout)
            .finish_non_exhaustive()
    }
}

impl GraphStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(
        scanner: Arc<dyn Scanner>,
        probe: Arc<dyn KeyFileProbe>,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            snapshots: Arc::default(),
            coordinator: ScanCoordinator::new(),
            scanner,
            probe,
            scan_timeout,
        }
    }

    /// Return a usable snapshot for `workspace_root`, scanning if needed.
    ///
    /// With `force_refresh` the cache check is skipped. A scan that is already
    /// pending for the root is still joined rather than duplicated.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Scan` with the scan's failure. Every caller that
    /// waited on the same scan receives the same error.
    pub async fn load_graph(
        &self,
        workspace_root: &Path,
        scan_path: &Path,
        force_refresh: bool,
    ) -> Result<LoadedGraph> {
        let seen = self.cached(workspace_root);

        if force_refresh {
            debug!(workspace = %workspace_root.display(), "Forced refresh, skipping cache check");
        } else {
            let timestamps = self.probe.timestamps(workspace_root);
            let validation = cache::validate(seen.as_deref(), &timestamps);
            if let (true, Some(snapshot)) = (validation.is_valid, &seen) {
                debug!(workspace = %workspace_root.display(), "Using cached dependency graph");
                return Ok(LoadedGraph {
                    snapshot: Arc::clone(snapshot),
                    from_cache: true,
                });
            }
            debug!(
                workspace = %workspace_root.display(),
                reason = validation.reason.as_deref().unwrap_or("unknown"),
                "Cached dependency graph unusable"
            );
        }

        let ticket = self.coordinator.acquire(workspace_root, || {
            // A scan may have finished between the cache check and here.
            if !force_refresh
                && let Some(current) = self.cached(workspace_root)
                && seen.as_ref().is_none_or(|s| !Arc::ptr_eq(s, &current))
            {
                debug!(workspace = %workspace_root.display(), "Snapshot replaced while waiting, reusing it");
                return future::ready(Ok(current)).boxed();
            }
            self.start_scan(workspace_root, scan_path)
        });

        if !ticket.started_new() {
            debug!(workspace = %workspace_root.display(), "Waiting on scan started by another caller");
        }

        let snapshot = ticket.into_pending().wait().await?;
        Ok(LoadedGraph {
            snapshot,
            from_cache: false,
        })
    }

    /// The stored snapshot for `workspace_root`, without validation.
    #[must_use]
    pub fn cached(&self, workspace_root: &Path) -> Option<Arc<GraphSnapshot>> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(workspace_root)
            .cloned()
    }

    /// Drop the stored snapshot for `workspace_root`.
    ///
    /// Returns `true` if a snapshot was removed. A scan already in flight is
    /// not affected and will store its result when it completes.
    pub fn invalidate(&self, workspace_root: &Path) -> bool {
        let removed = self
            .snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(workspace_root)
            .is_some();
        if removed {
            info!(workspace = %workspace_root.display(), "Invalidated cached dependency graph");
        }
        removed
    }

    /// Abort the in-flight scan for `workspace_root`, failing every waiter with
    /// `ScanError::Cancelled`. Returns `false` if nothing was scanning.
    pub fn cancel_scan(&self, workspace_root: &Path) -> bool {
        self.coordinator.cancel(workspace_root)
    }

    /// Returns `true` while a scan for `workspace_root` is in flight.
    #[must_use]
    pub fn is_scanning(&self, workspace_root: &Path) -> bool {
        self.coordinator.is_pending(workspace_root)
    }

    fn start_scan(&self, workspace_root: &Path, scan_path: &Path) -> BoxFuture<'static, ScanOutcome> {
        let scanner = Arc::clone(&self.scanner);
        let snapshots = Arc::clone(&self.snapshots);
        let limit = self.scan_timeout;
        let workspace_root = workspace_root.to_path_buf();
        let scan_path = scan_path.to_path_buf();

        async move {
            let timestamp = Utc::now();
            let started = Instant::now();
            info!(
                workspace = %workspace_root.display(),
                scan_path = %scan_path.display(),
                "Scanning workspace dependencies"
            );

            let raw = match tokio::time::timeout(limit, scanner.scan(&workspace_root, &scan_path)).await {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    warn!(workspace = %workspace_root.display(), error = %e, "Dependency scan failed");
                    return Err(e);
                }
                Err(_) => {
                    warn!(
                        workspace = %workspace_root.display(),
                        timeout_secs = limit.as_secs_f64(),
                        "Dependency scan timed out"
                    );
                    return Err(ScanError::TimedOut(limit));
                }
            };

            let snapshot = Arc::new(GraphSnapshot::from_raw(
                raw,
                SnapshotMetadata {
                    timestamp,
                    workspace_root: workspace_root.clone(),
                    scan_path,
                },
            ));

            info!(
                workspace = %workspace_root.display(),
                nodes = snapshot.node_count(),
                edges = snapshot.edge_count(),
                warnings = snapshot.warnings().len(),
                elapsed_ms = started.elapsed().as_millis(),
                "Dependency scan complete"
            );

            snapshots
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(workspace_root, Arc::clone(&snapshot));

            Ok(snapshot)
        }
        .boxed()
    }
}
