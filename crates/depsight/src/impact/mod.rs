//! Change impact analysis for a single file.
//!
//! Given a path as a user typed it, [`ImpactAnalyzer::analyze`] resolves it to
//! a node (see [`resolve`]), then reports:
//!
//! - **dependents**: files that import it (edges targeting it)
//! - **dependencies**: files it imports (edges leaving it)
//! - a small sub-graph of the file and its direct neighbours
//! - a templated narrative and a coarse risk level
//!
//! The whole analysis is bounded by a time budget and fails with
//! `ANALYSIS_TIMEOUT` when it is exceeded.

pub mod resolve;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ImpactConfig;
use crate::error::{EngineError, Result};
use crate::model::{Edge, GraphSnapshot, Node};

pub use resolve::{MatchReason, PathResolution, PathSuggestion, normalize_request_path};

/// Names listed in the narrative before the rest are summarized as a count.
const NARRATIVE_NAME_LIMIT: usize = 3;

/// The kind of change the caller is planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Editing the file in place.
    Modify,
    /// Removing the file.
    Delete,
    /// Moving or renaming the file.
    Rename,
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "modify" => Ok(Self::Modify),
            "delete" => Ok(Self::Delete),
            "rename" => Ok(Self::Rename),
            other => Err(format!(
                "unknown change type '{other}', expected modify, delete or rename"
            )),
        }
    }
}

/// Coarse blast radius of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Few or no dependents.
    Low,
    /// Several dependents.
    Medium,
    /// Many dependents.
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// The analyzed file, its direct neighbours, and the edges among them.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ImpactSubgraph {
    /// Nodes in id order.
    pub nodes: Vec<Node>,
    /// Edges whose endpoints are both in `nodes`.
    pub edges: Vec<Edge>,
}

/// Facts about the analysis run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct AnalysisMetadata {
    /// Wall-clock time spent analyzing.
    pub duration_ms: u64,
    /// `true` if the snapshot came from the cache.
    pub cache_used: bool,
    /// Nodes in the analyzed snapshot.
    pub graph_node_count: usize,
    /// Edges in the analyzed snapshot.
    pub graph_edge_count: usize,
    /// Timestamp of the analyzed snapshot.
    pub snapshot_timestamp: DateTime<Utc>,
    /// When the analysis ran.
    pub analyzed_at: DateTime<Utc>,
}

/// Everything known about changing one file.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ImpactResult {
    /// How the requested path was resolved.
    pub path_resolution: PathResolution,
    /// Files importing the target, sorted.
    pub dependents: Vec<String>,
    /// Files the target imports, sorted.
    pub dependencies: Vec<String>,
    /// The planned change, if the caller gave one.
    pub change_type: Option<ChangeType>,
    /// Blast radius from the number of dependents.
    pub risk_level: RiskLevel,
    /// Human-readable summary.
    pub summary: String,
    /// Neighbourhood of the target.
    pub subgraph: ImpactSubgraph,
    /// Run metadata.
    pub metadata: AnalysisMetadata,
}

/// Time budget for one analysis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub(crate) fn new(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.started.elapsed() >= self.limit {
            return Err(EngineError::AnalysisTimeout { limit: self.limit });
        }
        Ok(())
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Computes [`ImpactResult`]s.
#[derive(Debug, Clone, Default)]
pub struct ImpactAnalyzer {
    config: ImpactConfig,
}

impl ImpactAnalyzer {
    /// Create an analyzer with the given policy.
    #[must_use]
    pub fn new(config: ImpactConfig) -> Self {
        Self { config }
    }

    /// Analyze the impact of changing `file_path`.
    ///
    /// # Errors
    ///
    /// Path errors from resolution (`INVALID_PATH`, `PATH_SECURITY`,
    /// `WORKSPACE_BOUNDARY_VIOLATION`, `FILE_NOT_FOUND` with suggestions) and
    /// `ANALYSIS_TIMEOUT` if the time budget runs out.
    pub fn analyze(
        &self,
        snapshot: &GraphSnapshot,
        file_path: &str,
        workspace_root: &Path,
        change_type: Option<ChangeType>,
        cache_used: bool,
    ) -> Result<ImpactResult> {
        let deadline = Deadline::new(self.config.analysis_timeout());
        let path_resolution =
            resolve::resolve(snapshot, file_path, workspace_root, &self.config, &deadline)?;
        let target = path_resolution.resolved_path.as_str();

        let mut dependents = BTreeSet::new();
        let mut dependencies = BTreeSet::new();
        for edge in snapshot.edges() {
            if edge.target == target {
                dependents.insert(edge.source.clone());
            }
            if edge.source == target {
                dependencies.insert(edge.target.clone());
            }
        }
        deadline.check()?;

        let subgraph = build_subgraph(snapshot, target, &dependents, &dependencies);
        let dependents: Vec<String> = dependents.into_iter().collect();
        let dependencies: Vec<String> = dependencies.into_iter().collect();

        let risk_level = self.risk_level(dependents.len());
        let summary = narrative(&path_resolution, &dependents, &dependencies, change_type);
        deadline.check()?;

        let duration_ms = u64::try_from(deadline.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            target = %target,
            dependents = dependents.len(),
            dependencies = dependencies.len(),
            duration_ms,
            "Impact analysis complete"
        );

        Ok(ImpactResult {
            dependents,
            dependencies,
            change_type,
            risk_level,
            summary,
            subgraph,
            metadata: AnalysisMetadata {
                duration_ms,
                cache_used,
                graph_node_count: snapshot.node_count(),
                graph_edge_count: snapshot.edge_count(),
                snapshot_timestamp: snapshot.metadata().timestamp,
                analyzed_at: Utc::now(),
            },
            path_resolution,
        })
    }

    fn risk_level(&self, dependent_count: usize) -> RiskLevel {
        if dependent_count >= self.config.high_risk_dependents {
            RiskLevel::High
        } else if dependent_count >= self.config.medium_risk_dependents {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

fn build_subgraph(
    snapshot: &GraphSnapshot,
    target: &str,
    dependents: &BTreeSet<String>,
    dependencies: &BTreeSet<String>,
) -> ImpactSubgraph {
    let mut members: BTreeSet<&str> = BTreeSet::new();
    members.insert(target);
    members.extend(dependents.iter().map(String::as_str));
    members.extend(dependencies.iter().map(String::as_str));

    let nodes = members
        .iter()
        .filter_map(|id| snapshot.node(id).cloned())
        .collect();
    let edges = snapshot
        .edges()
        .iter()
        .filter(|e| members.contains(e.source.as_str()) && members.contains(e.target.as_str()))
        .cloned()
        .collect();

    ImpactSubgraph { nodes, edges }
}

fn narrative(
    resolution: &PathResolution,
    dependents: &[String],
    dependencies: &[String],
    change_type: Option<ChangeType>,
) -> String {
    let target = &resolution.resolved_path;
    let mut sentences = Vec::new();

    if resolution.fuzzy_matched {
        sentences.push(format!(
            "Resolved '{}' to {target} ({}% confidence).",
            resolution.original_path, resolution.confidence
        ));
    }

    sentences.push(match dependents.len() {
        0 => format!("{target} is not imported by any file."),
        n => format!("{target} is imported by {} ({}).", files(n), name_list(dependents)),
    });

    sentences.push(match dependencies.len() {
        0 => "It has no dependencies.".to_string(),
        n => format!("It imports {} ({}).", files(n), name_list(dependencies)),
    });

    let consequence = match (change_type, dependents.len()) {
        (None, _) => None,
        (Some(ChangeType::Modify), 0) => {
            Some("Modifying it affects no other file directly.".to_string())
        }
        (Some(ChangeType::Modify), n) => Some(format!(
            "Modifying it may affect {} that import it.",
            files(n)
        )),
        (Some(ChangeType::Delete), 0) => {
            Some("Deleting it breaks no imports.".to_string())
        }
        (Some(ChangeType::Delete), n) => Some(format!(
            "Deleting it breaks imports in {}.",
            files(n)
        )),
        (Some(ChangeType::Rename), 0) => {
            Some("Renaming it requires no import updates.".to_string())
        }
        (Some(ChangeType::Rename), n) => Some(format!(
            "Renaming it requires updating imports in {}.",
            files(n)
        )),
    };
    sentences.extend(consequence);

    sentences.join(" ")
}

fn files(n: usize) -> String {
    if n == 1 {
        "1 file".to_string()
    } else {
        format!("{n} files")
    }
}

fn name_list(ids: &[String]) -> String {
    let shown: Vec<&str> = ids
        .iter()
        .take(NARRATIVE_NAME_LIMIT)
        .map(String::as_str)
        .collect();
    let rest = ids.len().saturating_sub(NARRATIVE_NAME_LIMIT);
    if rest == 0 {
        shown.join(", ")
    } else {
        format!("{} and {rest} more", shown.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SnapshotMetadata;
    use rstest::rstest;
    use std::path::PathBuf;

    fn snapshot(nodes: &[&str], edges: &[(&str, &str)]) -> GraphSnapshot {
        let root = Path::new("/ws");
        GraphSnapshot::new(
            nodes.iter().map(|id| Node::new(*id, root)),
            edges.iter().map(|(s, t)| Edge::new(*s, *t)),
            SnapshotMetadata {
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                workspace_root: PathBuf::from("/ws"),
                scan_path: PathBuf::from("/ws"),
            },
        )
    }

    fn sample() -> GraphSnapshot {
        snapshot(
            &["app.ts", "page.ts", "utils.ts", "format.ts", "unrelated.ts"],
            &[
                ("app.ts", "utils.ts"),
                ("page.ts", "utils.ts"),
                ("utils.ts", "format.ts"),
                ("app.ts", "page.ts"),
            ],
        )
    }

    #[test]
    fn collects_sorted_dependents_and_dependencies() {
        let result = ImpactAnalyzer::default()
            .analyze(&sample(), "utils.ts", Path::new("/ws"), None, true)
            .expect("analysis should succeed");

        assert_eq!(result.dependents, vec!["app.ts", "page.ts"]);
        assert_eq!(result.dependencies, vec!["format.ts"]);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result.metadata.cache_used);
        assert_eq!(result.metadata.graph_node_count, 5);
    }

    #[test]
    fn subgraph_holds_neighbours_and_their_edges() {
        let result = ImpactAnalyzer::default()
            .analyze(&sample(), "utils.ts", Path::new("/ws"), None, false)
            .expect("analysis should succeed");

        let ids: Vec<&str> = result.subgraph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["app.ts", "format.ts", "page.ts", "utils.ts"]);
        // app -> page connects two neighbours, so it is kept
        assert_eq!(result.subgraph.edges.len(), 4);
        assert!(
            result
                .subgraph
                .edges
                .iter()
                .all(|e| e.source != "unrelated.ts" && e.target != "unrelated.ts")
        );
    }

    #[test]
    fn narrative_lists_names_then_counts_the_rest() {
        let ids: Vec<String> = (0..5).map(|i| format!("user{i}.ts")).collect();
        assert_eq!(name_list(&ids), "user0.ts, user1.ts, user2.ts and 2 more");
        assert_eq!(name_list(&ids[..2]), "user0.ts, user1.ts");
    }

    #[rstest]
    #[case(None, "utils.ts is imported by 2 files (app.ts, page.ts). It imports 1 file (format.ts).")]
    #[case(Some(ChangeType::Delete), "Deleting it breaks imports in 2 files.")]
    #[case(Some(ChangeType::Rename), "Renaming it requires updating imports in 2 files.")]
    #[case(Some(ChangeType::Modify), "Modifying it may affect 2 files that import it.")]
    fn narrative_reflects_change_type(#[case] change: Option<ChangeType>, #[case] expected: &str) {
        let result = ImpactAnalyzer::default()
            .analyze(&sample(), "utils.ts", Path::new("/ws"), change, false)
            .expect("analysis should succeed");

        assert!(
            result.summary.contains(expected),
            "summary was: {}",
            result.summary
        );
    }

    #[test]
    fn fuzzy_resolution_is_mentioned_in_summary() {
        let result = ImpactAnalyzer::default()
            .analyze(&sample(), "utilz.ts", Path::new("/ws"), None, false)
            .expect("analysis should succeed");

        assert!(result.path_resolution.fuzzy_matched);
        assert!(result.summary.starts_with("Resolved 'utilz.ts' to utils.ts"));
    }

    #[test]
    fn risk_level_follows_dependent_thresholds() {
        let analyzer = ImpactAnalyzer::default();
        assert_eq!(analyzer.risk_level(0), RiskLevel::Low);
        assert_eq!(analyzer.risk_level(3), RiskLevel::Medium);
        assert_eq!(analyzer.risk_level(10), RiskLevel::High);
    }

    #[test]
    fn zero_budget_reports_analysis_timeout() {
        let analyzer = ImpactAnalyzer::new(ImpactConfig {
            analysis_timeout_ms: 0,
            ..ImpactConfig::default()
        });
        let err = analyzer
            .analyze(&sample(), "utils.ts", Path::new("/ws"), None, false)
            .expect_err("should time out");

        assert!(matches!(err, EngineError::AnalysisTimeout { .. }));
    }

    #[rstest]
    #[case("modify", ChangeType::Modify)]
    #[case("DELETE", ChangeType::Delete)]
    #[case("Rename", ChangeType::Rename)]
    fn change_type_parses_case_insensitively(#[case] input: &str, #[case] expected: ChangeType) {
        assert_eq!(input.parse::<ChangeType>(), Ok(expected));
    }
}
