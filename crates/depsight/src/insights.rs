//! Structural insights over a dependency snapshot.
//!
//! All functions here are pure and deterministic: the same snapshot always
//! yields the same hubs, orphans and cycles in the same order.
//!
//! Cycle detection uses petgraph's Tarjan SCC over a graph whose node indices
//! follow id order, so "smallest index" and "smallest id" coincide.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use schemars::JsonSchema;
use serde::Serialize;

use crate::model::GraphSnapshot;

/// Fan-in and fan-out of one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct NodeDegree {
    /// Number of files importing this one.
    pub in_degree: usize,
    /// Number of files this one imports.
    pub out_degree: usize,
}

impl NodeDegree {
    /// Total number of connections.
    #[must_use]
    pub fn total(&self) -> usize {
        self.in_degree + self.out_degree
    }
}

/// A highly connected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Hub {
    /// Node id.
    pub id: String,
    /// Incoming plus outgoing edges.
    pub connection_count: usize,
}

/// Degree statistics for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct DegreeStats {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Mean total degree per node.
    pub average_degree: f64,
    /// Largest total degree of any node.
    pub max_degree: usize,
    /// Edges divided by the number of possible directed edges.
    pub density: f64,
}

/// Hubs, cycles and orphans of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Insights {
    /// Most connected files, best first.
    pub top_hubs: Vec<Hub>,
    /// Each entry is one cycle, as node ids.
    pub circular_dependencies: Vec<Vec<String>>,
    /// Files with no edges at all.
    pub orphan_files: Vec<String>,
}

impl Insights {
    /// Compute all insights for `snapshot`.
    #[must_use]
    pub fn compute(snapshot: &GraphSnapshot, hub_limit: usize) -> Self {
        let degrees = degrees(snapshot);
        Self {
            top_hubs: rank_hubs(&degrees, hub_limit),
            circular_dependencies: circular_dependencies(snapshot),
            orphan_files: orphans_from(&degrees),
        }
    }
}

/// In/out degree of every node, keyed by id.
///
/// A self-loop counts once as incoming and once as outgoing.
#[must_use]
pub fn degrees(snapshot: &GraphSnapshot) -> BTreeMap<String, NodeDegree> {
    let mut degrees: BTreeMap<String, NodeDegree> = snapshot
        .nodes()
        .map(|node| (node.id.clone(), NodeDegree::default()))
        .collect();

    for edge in snapshot.edges() {
        if let Some(degree) = degrees.get_mut(&edge.source) {
            degree.out_degree += 1;
        }
        if let Some(degree) = degrees.get_mut(&edge.target) {
            degree.in_degree += 1;
        }
    }

    degrees
}

/// The `limit` most connected files, ties broken by id.
///
/// Every file is ranked, so isolated files fill the tail when fewer than
/// `limit` files have connections.
#[must_use]
pub fn top_hubs(snapshot: &GraphSnapshot, limit: usize) -> Vec<Hub> {
    rank_hubs(&degrees(snapshot), limit)
}

/// Files with neither dependents nor dependencies, in id order.
#[must_use]
pub fn orphan_files(snapshot: &GraphSnapshot) -> Vec<String> {
    orphans_from(&degrees(snapshot))
}

/// Every dependency cycle in the snapshot.
///
/// Each strongly connected component with more than one member is a cycle,
/// listed in depth-first order starting at its smallest id. A file importing
/// itself is a cycle of one. Cycles are sorted by their first member.
#[must_use]
pub fn circular_dependencies(snapshot: &GraphSnapshot) -> Vec<Vec<String>> {
    let (graph, _) = build_graph(snapshot);

    let mut cycles: Vec<Vec<String>> = algo::tarjan_scc(&graph)
        .into_iter()
        .filter_map(|component| match component.as_slice() {
            [] => None,
            [single] => graph
                .contains_edge(*single, *single)
                .then(|| vec![graph[*single].clone()]),
            _ => Some(order_component(&graph, &component)),
        })
        .collect();

    cycles.sort();
    cycles
}

/// Degree statistics for `snapshot`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn degree_stats(snapshot: &GraphSnapshot) -> DegreeStats {
    let degrees = degrees(snapshot);
    let node_count = snapshot.node_count();
    let edge_count = snapshot.edge_count();
    let max_degree = degrees.values().map(NodeDegree::total).max().unwrap_or(0);

    let average_degree = if node_count == 0 {
        0.0
    } else {
        (2 * edge_count) as f64 / node_count as f64
    };
    let density = if node_count < 2 {
        0.0
    } else {
        edge_count as f64 / (node_count * (node_count - 1)) as f64
    };

    DegreeStats {
        node_count,
        edge_count,
        average_degree,
        max_degree,
        density,
    }
}

/// Build a petgraph view of the snapshot with indices in id order.
pub(crate) fn build_graph(snapshot: &GraphSnapshot) -> (DiGraph<String, ()>, BTreeMap<String, NodeIndex>) {
    let mut graph = DiGraph::with_capacity(snapshot.node_count(), snapshot.edge_count());
    let mut index = BTreeMap::new();

    for node in snapshot.nodes() {
        index.insert(node.id.clone(), graph.add_node(node.id.clone()));
    }
    for edge in snapshot.edges() {
        if let (Some(&source), Some(&target)) = (index.get(&edge.source), index.get(&edge.target)) {
            graph.add_edge(source, target, ());
        }
    }

    (graph, index)
}

fn rank_hubs(degrees: &BTreeMap<String, NodeDegree>, limit: usize) -> Vec<Hub> {
    let mut hubs: Vec<Hub> = degrees
        .iter()
        .map(|(id, degree)| Hub {
            id: id.clone(),
            connection_count: degree.total(),
        })
        .collect();

    hubs.sort_by(|a, b| {
        b.connection_count
            .cmp(&a.connection_count)
            .then_with(|| a.id.cmp(&b.id))
    });
    hubs.truncate(limit);
    hubs
}

fn orphans_from(degrees: &BTreeMap<String, NodeDegree>) -> Vec<String> {
    degrees
        .iter()
        .filter(|(_, degree)| degree.total() == 0)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Depth-first preorder of a component from its smallest member, visiting
/// successors in id order and staying inside the component.
fn order_component(graph: &DiGraph<String, ()>, component: &[NodeIndex]) -> Vec<String> {
    let members: BTreeSet<NodeIndex> = component.iter().copied().collect();
    let Some(&start) = members.first() else {
        return Vec::new();
    };

    let mut visited = BTreeSet::new();
    let mut order = Vec::with_capacity(members.len());
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        order.push(graph[current].clone());

        let mut successors: Vec<NodeIndex> = graph
            .neighbors(current)
            .filter(|next| members.contains(next) && !visited.contains(next))
            .collect();
        successors.sort_unstable();
        successors.dedup();
        stack.extend(successors.into_iter().rev());
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Edge, Node, SnapshotMetadata};
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use std::path::{Path, PathBuf};

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

    #[test]
    fn three_node_cycle_is_reported_once() {
        let graph = snapshot(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        let insights = Insights::compute(&graph, 10);

        assert_eq!(insights.circular_dependencies, vec![vec!["A", "B", "C"]]);
        assert!(insights.orphan_files.is_empty());
    }

    #[test]
    fn cycle_members_follow_dfs_from_smallest_id() {
        // b and c both reachable from a; DFS goes a -> b -> d before c
        let graph = snapshot(
            &["a", "b", "c", "d"],
            &[("a", "c"), ("a", "b"), ("b", "d"), ("d", "a"), ("c", "a")],
        );

        assert_eq!(
            circular_dependencies(&graph),
            vec![vec!["a", "b", "d", "c"]]
        );
    }

    #[test]
    fn disconnected_node_is_orphan() {
        let graph = snapshot(&["A", "B", "D"], &[("A", "B")]);
        assert_eq!(orphan_files(&graph), vec!["D"]);
    }

    #[test]
    fn self_loop_is_a_singleton_cycle_and_not_orphan() {
        let graph = snapshot(&["a", "b"], &[("a", "a")]);
        let insights = Insights::compute(&graph, 10);

        assert_eq!(insights.circular_dependencies, vec![vec!["a"]]);
        assert_eq!(insights.orphan_files, vec!["b"]);
        let degree = degrees(&graph)["a"];
        assert_eq!((degree.in_degree, degree.out_degree), (1, 1));
    }

    #[test]
    fn independent_cycles_are_sorted_by_first_member() {
        let graph = snapshot(
            &["m", "n", "x", "y"],
            &[("x", "y"), ("y", "x"), ("n", "m"), ("m", "n")],
        );
        assert_eq!(
            circular_dependencies(&graph),
            vec![vec!["m", "n"], vec!["x", "y"]]
        );
    }

    #[test]
    fn hubs_rank_by_degree_then_id() {
        let graph = snapshot(
            &["core", "a", "b", "c", "lonely"],
            &[("a", "core"), ("b", "core"), ("c", "core"), ("a", "b")],
        );

        let hubs = top_hubs(&graph, 10);
        let ids: Vec<&str> = hubs.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["core", "a", "b", "c", "lonely"]);
        assert_eq!(hubs[0].connection_count, 3);
        assert_eq!(hubs[4].connection_count, 0);
        assert_eq!(top_hubs(&graph, 2).len(), 2);
    }

    #[test]
    fn isolated_files_are_still_ranked() {
        let graph = snapshot(&["z", "y", "x"], &[]);

        let hubs = top_hubs(&graph, 2);
        let ranked: Vec<(&str, usize)> = hubs
            .iter()
            .map(|h| (h.id.as_str(), h.connection_count))
            .collect();
        assert_eq!(ranked, vec![("x", 0), ("y", 0)]);
    }

    #[test]
    fn degree_stats_on_empty_graph_are_zero() {
        let stats = degree_stats(&snapshot(&[], &[]));
        assert_eq!(stats.node_count, 0);
        assert!(stats.average_degree.abs() < f64::EPSILON);
        assert!(stats.density.abs() < f64::EPSILON);
    }

    #[test]
    fn degree_stats_counts_density() {
        let stats = degree_stats(&snapshot(&["a", "b"], &[("a", "b"), ("b", "a")]));
        assert_eq!(stats.max_degree, 2);
        assert!((stats.density - 1.0).abs() < f64::EPSILON);
        assert!((stats.average_degree - 2.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn insights_are_deterministic(edges in prop::collection::vec((0u8..8, 0u8..8), 0..24)) {
            let ids: Vec<String> = (0..8).map(|i| format!("n{i}")).collect();
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let edge_ids: Vec<(String, String)> = edges
                .iter()
                .map(|(s, t)| (format!("n{s}"), format!("n{t}")))
                .collect();
            let edge_refs: Vec<(&str, &str)> = edge_ids
                .iter()
                .map(|(s, t)| (s.as_str(), t.as_str()))
                .collect();

            let first = Insights::compute(&snapshot(&id_refs, &edge_refs), 5);
            let reversed: Vec<(&str, &str)> = edge_refs.iter().rev().copied().collect();
            let second = Insights::compute(&snapshot(&id_refs, &reversed), 5);

            prop_assert_eq!(&first, &second);
            for cycle in &first.circular_dependencies {
                prop_assert!(cycle.first() == cycle.iter().min());
            }
        }
    }
}
