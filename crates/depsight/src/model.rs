//! Dependency graph value types.
//!
//! A [`GraphSnapshot`] is built once from a scanner payload and never mutated
//! afterwards; callers share it as `Arc<GraphSnapshot>`.
//!
//! # Boundary Coercion
//!
//! Scanners return loosely typed JSON ([`RawGraph`]). [`GraphSnapshot::from_raw`]
//! coerces it into strict [`Node`]/[`Edge`] values. Entries that fail validation
//! are dropped and recorded as [`GraphWarning`]s:
//!
//! - nodes without a usable `id`
//! - repeated node ids (the first occurrence wins)
//! - edges without `source`/`target`
//! - edges whose endpoints are not in the node set
//!
//! None of these are fatal.
//!
//! # Edge Direction
//!
//! Edges point from **dependent -> dependency**: `source` imports `target`.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A file in the dependency graph.
///
/// Identity is the workspace-relative `id`; two nodes with the same id are
/// equal regardless of their other fields.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    /// Workspace-relative path with `/` separators. Unique key.
    pub id: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Display name.
    pub label: String,
    /// Monorepo package the file belongs to, if known.
    pub package: Option<String>,
}

impl Node {
    /// Create a node whose absolute path and label are derived from its id.
    #[must_use]
    pub fn new(id: impl Into<String>, workspace_root: &Path) -> Self {
        let id = normalize_id(&id.into());
        Self {
            path: workspace_root.join(&id),
            label: default_label(&id),
            id,
            package: None,
        }
    }

    /// Set the monorepo package name.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

/// A directed dependency: `source` depends on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    /// Id of the importing file.
    pub source: String,
    /// Id of the imported file.
    pub target: String,
}

impl Edge {
    /// Create an edge between two node ids.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Returns `true` for an edge from a node to itself.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Where and when a snapshot was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotMetadata {
    /// When the scan that produced the snapshot started.
    pub timestamp: DateTime<Utc>,
    /// Workspace root the snapshot belongs to.
    pub workspace_root: PathBuf,
    /// Directory that was scanned (the root or a sub-directory of it).
    pub scan_path: PathBuf,
}

/// Untyped scanner output, validated by [`GraphSnapshot::from_raw`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawGraph {
    /// Node payloads: objects with `id` (and optional `path`, `label`,
    /// `package`) or bare id strings.
    #[serde(default)]
    pub nodes: Vec<Value>,
    /// Edge payloads: objects with `source`/`target` (or `from`/`to`).
    #[serde(default)]
    pub edges: Vec<Value>,
}

/// A non-fatal problem found while building a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphWarning {
    /// A node entry could not be coerced into a [`Node`].
    MalformedNode {
        /// Position in the scanner's node list.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
    /// A node id appeared more than once; later entries were ignored.
    DuplicateNode {
        /// The repeated id.
        id: String,
    },
    /// An edge entry could not be coerced into an [`Edge`].
    MalformedEdge {
        /// Position in the scanner's edge list.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
    /// An edge referenced an id that is not in the node set.
    DanglingEdge {
        /// Edge source id.
        source: String,
        /// Edge target id.
        target: String,
        /// The endpoint that is missing.
        missing: String,
    },
}

impl GraphWarning {
    /// Returns a human-readable description of the warning.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::MalformedNode { index, reason } => format!("node {index}: {reason}"),
            Self::DuplicateNode { id } => format!("duplicate node id: {id}"),
            Self::MalformedEdge { index, reason } => format!("edge {index}: {reason}"),
            Self::DanglingEdge {
                source,
                target,
                missing,
            } => format!("edge {source} -> {target} dropped: unknown node {missing}"),
        }
    }
}

/// An immutable, timestamped dependency graph for one workspace root.
///
/// Nodes are held in id order and edges in `(source, target)` order, so every
/// iteration over a snapshot is deterministic.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GraphSnapshot {
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
    metadata: SnapshotMetadata,
    warnings: Vec<GraphWarning>,
}

impl GraphSnapshot {
    /// Build a snapshot from typed nodes and edges.
    ///
    /// Duplicate edges are collapsed and edges with unknown endpoints are
    /// dropped with a warning.
    #[must_use]
    pub fn new(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
        metadata: SnapshotMetadata,
    ) -> Self {
        let mut builder = SnapshotBuilder::default();
        for node in nodes {
            builder.add_node(node);
        }
        for edge in edges {
            builder.add_edge(edge);
        }
        builder.finish(metadata)
    }

    /// Build a snapshot from untyped scanner output.
    #[must_use]
    pub fn from_raw(raw: RawGraph, metadata: SnapshotMetadata) -> Self {
        let mut builder = SnapshotBuilder::default();

        for (index, value) in raw.nodes.into_iter().enumerate() {
            match coerce_node(&value, &metadata.workspace_root) {
                Ok(node) => builder.add_node(node),
                Err(reason) => builder.warn(GraphWarning::MalformedNode { index, reason }),
            }
        }

        for (index, value) in raw.edges.into_iter().enumerate() {
            match coerce_edge(&value) {
                Ok(edge) => builder.add_edge(edge),
                Err(reason) => builder.warn(GraphWarning::MalformedEdge { index, reason }),
            }
        }

        builder.finish(metadata)
    }

    /// Iterate over nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns `true` if a node with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All edges, deduplicated and sorted by `(source, target)`.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of (deduplicated) edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Where and when this snapshot was produced.
    #[must_use]
    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    /// Problems found while building the snapshot.
    #[must_use]
    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }
}

#[derive(Default)]
struct SnapshotBuilder {
    nodes: BTreeMap<String, Node>,
    edges: BTreeSet<Edge>,
    warnings: Vec<GraphWarning>,
}

impl SnapshotBuilder {
    fn add_node(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            self.warn(GraphWarning::DuplicateNode { id: node.id });
            return;
        }
        self.nodes.insert(node.id.clone(), node);
    }

    fn add_edge(&mut self, edge: Edge) {
        self.edges.insert(Edge {
            source: normalize_id(&edge.source),
            target: normalize_id(&edge.target),
        });
    }

    fn warn(&mut self, warning: GraphWarning) {
        warn!(warning = %warning.description(), "Dropping malformed graph entry");
        self.warnings.push(warning);
    }

    fn finish(mut self, metadata: SnapshotMetadata) -> GraphSnapshot {
        let candidates = std::mem::take(&mut self.edges);
        let mut edges = Vec::with_capacity(candidates.len());

        for edge in candidates {
            let missing = if self.nodes.contains_key(&edge.source) {
                if self.nodes.contains_key(&edge.target) {
                    None
                } else {
                    Some(edge.target.clone())
                }
            } else {
                Some(edge.source.clone())
            };

            match missing {
                None => edges.push(edge),
                Some(missing) => self.warn(GraphWarning::DanglingEdge {
                    source: edge.source,
                    target: edge.target,
                    missing,
                }),
            }
        }

        debug!(
            nodes = self.nodes.len(),
            edges = edges.len(),
            warnings = self.warnings.len(),
            "Built dependency graph snapshot"
        );

        GraphSnapshot {
            nodes: self.nodes,
            edges,
            metadata,
            warnings: self.warnings,
        }
    }
}

/// Normalize a scanner-reported id to `/`-separated form without a leading `./`.
pub(crate) fn normalize_id(id: &str) -> String {
    let unified = id.trim().replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

fn default_label(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

fn coerce_node(value: &Value, workspace_root: &Path) -> std::result::Result<Node, String> {
    let object = match value {
        Value::String(id) => return node_from_id(id, workspace_root),
        Value::Object(object) => object,
        other => return Err(format!("expected object or string, found {}", json_kind(other))),
    };

    let id = match object.get("id") {
        Some(Value::String(id)) => id,
        Some(other) => return Err(format!("id must be a string, found {}", json_kind(other))),
        None => return Err("missing id".to_string()),
    };
    let mut node = node_from_id(id, workspace_root)?;

    if let Some(path) = optional_string(object.get("path"), "path")? {
        node.path = PathBuf::from(path);
    }
    if let Some(label) = optional_string(object.get("label"), "label")? {
        node.label = label.to_string();
    }
    node.package = optional_string(object.get("package"), "package")?.map(str::to_string);

    Ok(node)
}

fn node_from_id(id: &str, workspace_root: &Path) -> std::result::Result<Node, String> {
    if normalize_id(id).is_empty() {
        return Err("empty id".to_string());
    }
    Ok(Node::new(id, workspace_root))
}

fn coerce_edge(value: &Value) -> std::result::Result<Edge, String> {
    let Value::Object(object) = value else {
        return Err(format!("expected object, found {}", json_kind(value)));
    };

    let endpoint = |primary: &str, alias: &str| -> std::result::Result<String, String> {
        match object.get(primary).or_else(|| object.get(alias)) {
            Some(Value::String(id)) if !normalize_id(id).is_empty() => Ok(id.clone()),
            Some(Value::String(_)) => Err(format!("empty {primary}")),
            Some(other) => Err(format!("{primary} must be a string, found {}", json_kind(other))),
            None => Err(format!("missing {primary}")),
        }
    };

    Ok(Edge::new(endpoint("source", "from")?, endpoint("target", "to")?))
}

fn optional_string<'a>(
    value: Option<&'a Value>,
    field: &str,
) -> std::result::Result<Option<&'a str>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(format!("{field} must be a string, found {}", json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
