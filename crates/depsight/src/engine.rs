//! Caller-facing operations.
//!
//! [`Engine`] is the explicitly constructed service object the UI and protocol
//! layers talk to. It resolves workspace roots, loads snapshots through the
//! shared [`GraphStore`], and runs the synchronous analyzers over them.
//!
//! `Engine` is cheap to clone; clones share the same store, so concurrent
//! requests for one workspace still trigger a single scan.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::cache::{FsKeyFileProbe, KeyFileProbe};
use crate::config::{EngineConfig, InsightsConfig};
use crate::error::{EngineError, Result};
use crate::health::{HealthAnalyzer, HealthReport};
use crate::impact::{ChangeType, ImpactAnalyzer, ImpactResult};
use crate::insights::{self, DegreeStats, Insights};
use crate::model::{GraphSnapshot, SnapshotMetadata};
use crate::scanner::Scanner;
use crate::signals::{NoSignals, RiskSignals};
use crate::store::{GraphStore, LoadedGraph};

/// Per-request flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Skip cache validation and scan again. A scan already in flight for the
    /// workspace is joined rather than duplicated.
    pub force_refresh: bool,
}

impl RequestOptions {
    /// Options that force a fresh scan.
    #[must_use]
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

/// Overview of a workspace's dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct GraphSummary {
    /// Where and when the snapshot was produced.
    pub metadata: SnapshotMetadata,
    /// Degree statistics, including node and edge counts.
    pub stats: DegreeStats,
    /// Hubs, cycles and orphans.
    pub insights: Insights,
    /// File count per monorepo package; files without one are not counted.
    pub packages: BTreeMap<String, usize>,
    /// Malformed scanner entries dropped while building the snapshot.
    pub warning_count: usize,
    /// `true` if the snapshot came from the cache.
    pub from_cache: bool,
}

impl GraphSummary {
    /// Summarize `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: &GraphSnapshot, hub_limit: usize, from_cache: bool) -> Self {
        let mut packages = BTreeMap::new();
        for package in snapshot.nodes().filter_map(|n| n.package.as_ref()) {
            *packages.entry(package.clone()).or_insert(0) += 1;
        }

        Self {
            metadata: snapshot.metadata().clone(),
            stats: insights::degree_stats(snapshot),
            insights: Insights::compute(snapshot, hub_limit),
            packages,
            warning_count: snapshot.warnings().len(),
            from_cache,
        }
    }
}

/// Builds an [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    scanner: Arc<dyn Scanner>,
    probe: Option<Arc<dyn KeyFileProbe>>,
    signals: Option<Arc<dyn RiskSignals>>,
}

impl EngineBuilder {
    /// Start a builder around the scanner every workspace will use.
    #[must_use]
    pub fn new(scanner: Arc<dyn Scanner>) -> Self {
        Self {
            config: EngineConfig::default(),
            scanner,
            probe: None,
            signals: None,
        }
    }

    /// Use this configuration instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom key-file probe. Defaults to a filesystem probe built from
    /// the cache configuration.
    #[must_use]
    pub fn probe(mut self, probe: Arc<dyn KeyFileProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Supply per-file risk signals. Defaults to none (neutral).
    #[must_use]
    pub fn signals(mut self, signals: Arc<dyn RiskSignals>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Validate the configuration and build the engine.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the configuration is invalid.
    pub fn build(self) -> Result<Engine> {
        let config = self.config;
        config.validate()?;

        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(FsKeyFileProbe::from_config(&config.cache)));
        let signals = self.signals.unwrap_or_else(|| Arc::new(NoSignals));

        Ok(Engine {
            store: Arc::new(GraphStore::new(self.scanner, probe, config.scan.timeout())),
            insights: config.insights.clone(),
            health: HealthAnalyzer::new(config.health.clone(), config.insights.hub_limit),
            impact: ImpactAnalyzer::new(config.impact.clone()),
            signals,
        })
    }
}

/// Entry point for all caller-facing operations.
#[derive(Clone)]
pub struct Engine {
    store: Arc<GraphStore>,
    insights: InsightsConfig,
    health: HealthAnalyzer,
    impact: ImpactAnalyzer,
    signals: Arc<dyn RiskSignals>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("insights", &self.insights)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Start building an engine around `scanner`.
    #[must_use]
    pub fn builder(scanner: Arc<dyn Scanner>) -> EngineBuilder {
        EngineBuilder::new(scanner)
    }

    /// Load the dependency graph of `workspace_root`.
    ///
    /// `scan_path` narrows the scan to a directory inside the workspace; the
    /// result still replaces the workspace's single stored snapshot.
    ///
    /// # Errors
    ///
    /// - `WORKSPACE_NOT_FOUND` if the root does not resolve to a directory
    /// - `INVALID_PATH` or `WORKSPACE_BOUNDARY_VIOLATION` for a bad `scan_path`
    /// - any scan failure, shared with every concurrent caller
    pub async fn load_graph(
        &self,
        workspace_root: &Path,
        scan_path: Option<&Path>,
        options: RequestOptions,
    ) -> Result<LoadedGraph> {
        let root = resolve_workspace_root(workspace_root).await?;
        let scan_path = resolve_scan_path(&root, scan_path).await?;
        self.store
            .load_graph(&root, &scan_path, options.force_refresh)
            .await
    }

    /// Drop the stored snapshot for `workspace_root`.
    ///
    /// Returns `true` if there was one.
    ///
    /// # Errors
    ///
    /// Returns `WORKSPACE_NOT_FOUND` if the root does not resolve.
    pub async fn invalidate(&self, workspace_root: &Path) -> Result<bool> {
        let root = resolve_workspace_root(workspace_root).await?;
        Ok(self.store.invalidate(&root))
    }

    /// Abort the scan in flight for `workspace_root`.
    ///
    /// Every caller waiting on it fails with `SCAN_CANCELLED`; the stored
    /// snapshot, if any, is kept. Returns `false` if nothing was scanning.
    ///
    /// # Errors
    ///
    /// Returns `WORKSPACE_NOT_FOUND` if the root does not resolve.
    pub async fn cancel_scan(&self, workspace_root: &Path) -> Result<bool> {
        let root = resolve_workspace_root(workspace_root).await?;
        Ok(self.store.cancel_scan(&root))
    }

    /// Returns `true` while a scan for `workspace_root` is in flight.
    ///
    /// # Errors
    ///
    /// Returns `WORKSPACE_NOT_FOUND` if the root does not resolve.
    pub async fn is_scanning(&self, workspace_root: &Path) -> Result<bool> {
        let root = resolve_workspace_root(workspace_root).await?;
        Ok(self.store.is_scanning(&root))
    }

    /// The stored snapshot, without validation or scanning.
    ///
    /// This is the fallback after a failed scan: the previous snapshot stays
    /// available here until it is replaced or invalidated.
    ///
    /// # Errors
    ///
    /// Returns `WORKSPACE_NOT_FOUND` if the root does not resolve.
    pub async fn cached_graph(&self, workspace_root: &Path) -> Result<Option<Arc<GraphSnapshot>>> {
        let root = resolve_workspace_root(workspace_root).await?;
        Ok(self.store.cached(&root))
    }

    /// Counts, degree statistics and structural insights.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::load_graph`].
    pub async fn get_summary(
        &self,
        workspace_root: &Path,
        options: RequestOptions,
    ) -> Result<GraphSummary> {
        let loaded = self.load_graph(workspace_root, None, options).await?;
        Ok(GraphSummary::from_snapshot(
            &loaded.snapshot,
            self.insights.hub_limit,
            loaded.from_cache,
        ))
    }

    /// Risk distribution, health score and recommendations.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::load_graph`].
    pub async fn get_health_report(
        &self,
        workspace_root: &Path,
        options: RequestOptions,
    ) -> Result<HealthReport> {
        let loaded = self.load_graph(workspace_root, None, options).await?;
        Ok(self.health.analyze(&loaded.snapshot, self.signals.as_ref()))
    }

    /// Dependents, dependencies and narrative for one file.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::load_graph`], plus the path resolution and timeout
    /// errors of [`ImpactAnalyzer::analyze`].
    pub async fn analyze_impact(
        &self,
        workspace_root: &Path,
        file_path: &str,
        change_type: Option<ChangeType>,
        options: RequestOptions,
    ) -> Result<ImpactResult> {
        let root = resolve_workspace_root(workspace_root).await?;
        let loaded = self.store.load_graph(&root, &root, options.force_refresh).await?;
        let file_path = rebase_absolute_request(file_path, workspace_root, &root).await;
        debug!(file = %file_path, workspace = %root.display(), "Analyzing change impact");
        self.impact
            .analyze(&loaded.snapshot, &file_path, &root, change_type, loaded.from_cache)
    }
}

/// Canonicalize a workspace root and check that it is a directory.
async fn resolve_workspace_root(workspace_root: &Path) -> Result<PathBuf> {
    let canonical = fs::canonicalize(workspace_root)
        .await
        .map_err(|source| EngineError::WorkspaceNotFound {
            path: workspace_root.to_path_buf(),
            source,
        })?;

    let metadata = fs::metadata(&canonical)
        .await
        .map_err(|source| EngineError::WorkspaceNotFound {
            path: workspace_root.to_path_buf(),
            source,
        })?;
    if !metadata.is_dir() {
        return Err(EngineError::WorkspaceNotFound {
            path: workspace_root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        });
    }

    Ok(canonical)
}

/// Spell an absolute request path through the canonical root.
///
/// Callers name files through the root they passed in, which may be a symlink
/// (or sit under one, like `/var` on macOS). Paths under the given root are
/// moved onto the canonical root; other absolute paths outside it get their
/// longest existing ancestor canonicalized. Relative paths and anything that
/// cannot be rebased are returned unchanged for the containment check.
async fn rebase_absolute_request(file_path: &str, given_root: &Path, root: &Path) -> String {
    let requested = Path::new(file_path.trim());
    if !requested.is_absolute() {
        return file_path.to_string();
    }

    if let Ok(inside) = requested.strip_prefix(given_root) {
        return root.join(inside).display().to_string();
    }
    if requested.starts_with(root) {
        return file_path.to_string();
    }

    for ancestor in requested.ancestors().skip(1) {
        if let Ok(canonical) = fs::canonicalize(ancestor).await
            && let Ok(tail) = requested.strip_prefix(ancestor)
        {
            return canonical.join(tail).display().to_string();
        }
    }
    file_path.to_string()
}

/// Resolve an optional scan path (relative to `root` or absolute) and check
/// that it stays inside the workspace.
async fn resolve_scan_path(root: &Path, scan_path: Option<&Path>) -> Result<PathBuf> {
    let Some(scan_path) = scan_path else {
        return Ok(root.to_path_buf());
    };

    let joined = root.join(scan_path);
    let canonical = fs::canonicalize(&joined)
        .await
        .map_err(|e| EngineError::InvalidPath {
            path: scan_path.display().to_string(),
            reason: e.to_string(),
        })?;

    if !canonical.starts_with(root) {
        return Err(EngineError::WorkspaceBoundaryViolation {
            path: scan_path.display().to_string(),
            workspace_root: root.to_path_buf(),
        });
    }
    Ok(canonical)
}
