//! Resolving a user-supplied path to a graph node.
//!
//! Resolution runs in three stages:
//!
//! 1. **Normalization**: separators are unified and `.`/`..` are folded
//!    lexically. Nothing is read from disk.
//! 2. **Containment**: a relative path whose `..` climbs above the root is a
//!    security violation, and so is an absolute path outside the root. Both
//!    are fatal and never corrected.
//! 3. **Matching**: an exact id match wins. Otherwise every node is scored by
//!    three heuristics and the best candidates become suggestions.
//!
//! | Heuristic        | Fires when                              | Confidence |
//! |------------------|-----------------------------------------|------------|
//! | `partial_path`   | id ends with or contains the query      | 50-99      |
//! | `similar_name`   | basenames are at least 50% similar      | 50-99      |
//! | `same_extension` | extensions match                        | 20-50      |
//!
//! An id ending with the whole query is scored by `partial_path` alone.

use std::path::{Component, Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Deadline;
use crate::config::ImpactConfig;
use crate::error::{EngineError, Result};
use crate::model::GraphSnapshot;

/// Bonus for `similar_name` when the query's directory matches the tail of the
/// candidate's directory.
const DIRECTORY_BONUS: f64 = 5.0;

/// Highest confidence a fuzzy match can reach; 100 is reserved for exact ids.
const MAX_FUZZY_CONFIDENCE: f64 = 99.0;

/// Nodes scored between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// Which heuristic produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// Basenames are nearly identical.
    SimilarName,
    /// The query is a suffix or substring of the id.
    PartialPath,
    /// Only the file extension matches.
    SameExtension,
}

impl MatchReason {
    /// Wire name, e.g. `"similar_name"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SimilarName => "similar_name",
            Self::PartialPath => "partial_path",
            Self::SameExtension => "same_extension",
        }
    }

    /// Preference when two heuristics give the same confidence; lower wins.
    fn rank(self) -> u8 {
        match self {
            Self::PartialPath => 0,
            Self::SimilarName => 1,
            Self::SameExtension => 2,
        }
    }
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate node for an unresolved path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PathSuggestion {
    /// Node id.
    pub path: String,
    /// Confidence in `[0, 99]`.
    pub confidence: u8,
    /// The heuristic that scored highest.
    pub reason: MatchReason,
}

/// How a requested path was mapped onto the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PathResolution {
    /// The path exactly as the caller supplied it.
    pub original_path: String,
    /// The node id that was analyzed.
    pub resolved_path: String,
    /// `true` if fuzzy matching chose the node.
    pub fuzzy_matched: bool,
    /// 100 for exact matches, otherwise the winning suggestion's confidence.
    pub confidence: u8,
    /// Ranked candidates considered during fuzzy matching.
    pub suggestions: Vec<PathSuggestion>,
}

/// Normalize `raw` into a workspace-relative id.
///
/// # Errors
///
/// - `EngineError::InvalidPath` for empty input, NUL bytes, or a path that
///   names the workspace root itself
/// - `EngineError::PathSecurity` if a relative path climbs above the root
/// - `EngineError::WorkspaceBoundaryViolation` for an absolute path outside
///   the root
pub fn normalize_request_path(raw: &str, workspace_root: &Path) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(raw, "path is empty"));
    }
    if trimmed.contains('\0') {
        return Err(invalid(raw, "path contains a NUL byte"));
    }

    let unified = trimmed.replace('\\', "/");
    let candidate = Path::new(&unified);

    let relative = if is_absolute(&unified) {
        let absolute = fold_absolute(candidate);
        let root = fold_absolute(workspace_root);
        match absolute.strip_prefix(&root) {
            Ok(inside) => inside.to_path_buf(),
            Err(_) => {
                return Err(EngineError::WorkspaceBoundaryViolation {
                    path: raw.to_string(),
                    workspace_root: workspace_root.to_path_buf(),
                });
            }
        }
    } else {
        candidate.to_path_buf()
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(EngineError::PathSecurity {
                        path: raw.to_string(),
                    });
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    if parts.is_empty() {
        return Err(invalid(raw, "path refers to the workspace root, not a file"));
    }
    Ok(parts.join("/"))
}

/// Resolve `raw` to a node of `snapshot`.
///
/// # Errors
///
/// Any error from [`normalize_request_path`], `EngineError::FileNotFound`
/// (carrying suggestions) when no candidate is confident and unique enough,
/// and `EngineError::AnalysisTimeout` if `deadline` passes while scoring.
pub(crate) fn resolve(
    snapshot: &GraphSnapshot,
    raw: &str,
    workspace_root: &Path,
    config: &ImpactConfig,
    deadline: &Deadline,
) -> Result<PathResolution> {
    let query = normalize_request_path(raw, workspace_root)?;

    if snapshot.contains(&query) {
        return Ok(PathResolution {
            original_path: raw.to_string(),
            resolved_path: query,
            fuzzy_matched: false,
            confidence: 100,
            suggestions: Vec::new(),
        });
    }

    let mut scored = Vec::new();
    for (position, node) in snapshot.nodes().enumerate() {
        if position % DEADLINE_CHECK_INTERVAL == 0 {
            deadline.check()?;
        }
        if let Some(suggestion) = score_candidate(&node.id, &query)
            && suggestion.confidence >= config.min_confidence
        {
            scored.push(suggestion);
        }
    }
    deadline.check()?;

    scored.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| a.path.cmp(&b.path))
    });

    let unique_top = match scored.as_slice() {
        [top, runner_up, ..] => top.confidence > runner_up.confidence,
        [_] => true,
        [] => false,
    };
    scored.truncate(config.max_suggestions);

    match scored.first() {
        Some(top) if unique_top && top.confidence >= config.auto_resolve_confidence => {
            debug!(
                query = %query,
                resolved = %top.path,
                confidence = top.confidence,
                reason = %top.reason,
                "Fuzzy-resolved requested path"
            );
            Ok(PathResolution {
                original_path: raw.to_string(),
                resolved_path: top.path.clone(),
                fuzzy_matched: true,
                confidence: top.confidence,
                suggestions: scored,
            })
        }
        _ => Err(EngineError::FileNotFound {
            path: raw.to_string(),
            suggestions: scored,
        }),
    }
}

/// Best heuristic score of node `id` against normalized `query`.
///
/// An id that ends with the whole query is a partial-path match outright;
/// comparing basenames adds nothing there.
fn score_candidate(id: &str, query: &str) -> Option<PathSuggestion> {
    if let Some(score) = suffix_score(id, query) {
        return Some(PathSuggestion {
            path: id.to_string(),
            confidence: to_confidence(score),
            reason: MatchReason::PartialPath,
        });
    }

    [
        (partial_path_score(id, query), MatchReason::PartialPath),
        (similar_name_score(id, query), MatchReason::SimilarName),
        (same_extension_score(id, query), MatchReason::SameExtension),
    ]
    .into_iter()
    .filter_map(|(score, reason)| score.map(|s| (to_confidence(s), reason)))
    .min_by(|(a, ra), (b, rb)| b.cmp(a).then_with(|| ra.rank().cmp(&rb.rank())))
    .map(|(confidence, reason)| PathSuggestion {
        path: id.to_string(),
        confidence,
        reason,
    })
}

#[allow(clippy::cast_precision_loss)]
fn length_ratio(short: &str, long: &str) -> f64 {
    short.len() as f64 / long.len().max(1) as f64
}

fn suffix_score(id: &str, query: &str) -> Option<f64> {
    id.ends_with(&format!("/{query}"))
        .then(|| 90.0 + 9.0 * length_ratio(query, id))
}

fn partial_path_score(id: &str, query: &str) -> Option<f64> {
    if query.ends_with(&format!("/{id}")) {
        Some(80.0 + 10.0 * length_ratio(id, query))
    } else if query.len() >= 3 && id.contains(query) {
        Some(50.0 + 30.0 * length_ratio(query, id))
    } else {
        None
    }
}

fn similar_name_score(id: &str, query: &str) -> Option<f64> {
    let (id_dir, id_name) = split_dir(id);
    let (query_dir, query_name) = split_dir(query);

    let similarity = name_similarity(&id_name.to_lowercase(), &query_name.to_lowercase());
    if similarity < 0.5 {
        return None;
    }

    let mut score = 100.0 * similarity;
    if let Some(query_dir) = query_dir
        && let Some(id_dir) = id_dir
        && (id_dir == query_dir || id_dir.ends_with(&format!("/{query_dir}")))
    {
        score += DIRECTORY_BONUS;
    }
    Some(score)
}

fn same_extension_score(id: &str, query: &str) -> Option<f64> {
    let (_, id_name) = split_dir(id);
    let (_, query_name) = split_dir(query);
    let (id_stem, id_ext) = split_extension(id_name)?;
    let (query_stem, query_ext) = split_extension(query_name)?;

    if !id_ext.eq_ignore_ascii_case(query_ext) {
        return None;
    }
    let stem_similarity = name_similarity(&id_stem.to_lowercase(), &query_stem.to_lowercase());
    Some(20.0 + 30.0 * stem_similarity)
}

/// `1 - distance / longer_length`, in `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn name_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Edit distance over chars.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != *b_char);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_confidence(score: f64) -> u8 {
    score.clamp(0.0, MAX_FUZZY_CONFIDENCE).round() as u8
}

fn split_dir(id: &str) -> (Option<&str>, &str) {
    match id.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, id),
    }
}

fn split_extension(name: &str) -> Option<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some((stem, ext)),
        _ => None,
    }
}

/// `/unix` paths and `C:/windows` paths are both absolute, whatever the host.
fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || (bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/')
}

fn fold_absolute(path: &Path) -> PathBuf {
    let mut folded = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                folded.pop();
            }
            Component::CurDir => {}
            other => folded.push(other.as_os_str()),
        }
    }
    folded
}

fn invalid(raw: &str, reason: &str) -> EngineError {
    EngineError::InvalidPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, SnapshotMetadata};
    use chrono::{DateTime, Utc};
    use rstest::rstest;
    use std::time::Duration;

    fn snapshot(ids: &[&str]) -> GraphSnapshot {
        let root = Path::new("/ws");
        GraphSnapshot::new(
            ids.iter().map(|id| Node::new(*id, root)),
            Vec::new(),
            SnapshotMetadata {
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                workspace_root: PathBuf::from("/ws"),
                scan_path: PathBuf::from("/ws"),
            },
        )
    }

    fn resolve_default(snapshot: &GraphSnapshot, raw: &str) -> Result<PathResolution> {
        resolve(
            snapshot,
            raw,
            Path::new("/ws"),
            &ImpactConfig::default(),
            &Deadline::new(Duration::from_secs(5)),
        )
    }

    #[rstest]
    #[case("src/a.ts", "src/a.ts")]
    #[case("./src/a.ts", "src/a.ts")]
    #[case("src\\lib\\a.ts", "src/lib/a.ts")]
    #[case("src/lib/../a.ts", "src/a.ts")]
    #[case("/ws/src/a.ts", "src/a.ts")]
    #[case("/ws/src/../src/a.ts", "src/a.ts")]
    fn normalizes_inside_workspace(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(
            normalize_request_path(raw, Path::new("/ws")).expect("should normalize"),
            expected
        );
    }

    #[rstest]
    #[case("", "INVALID_PATH")]
    #[case("   ", "INVALID_PATH")]
    #[case("src/\0a.ts", "INVALID_PATH")]
    #[case(".", "INVALID_PATH")]
    #[case("../../etc/passwd", "PATH_SECURITY")]
    #[case("src/../../secret.ts", "PATH_SECURITY")]
    #[case("/etc/passwd", "WORKSPACE_BOUNDARY_VIOLATION")]
    #[case("/ws-other/a.ts", "WORKSPACE_BOUNDARY_VIOLATION")]
    #[case("/ws/../etc/passwd", "WORKSPACE_BOUNDARY_VIOLATION")]
    fn rejects_unusable_or_escaping_paths(#[case] raw: &str, #[case] code: &str) {
        let err = normalize_request_path(raw, Path::new("/ws")).expect_err("should reject");
        assert_eq!(err.code().as_str(), code);
    }

    #[test]
    fn exact_match_has_full_confidence() {
        let graph = snapshot(&["src/a.ts", "src/b.ts"]);
        let resolution = resolve_default(&graph, "./src/a.ts").expect("should resolve");

        assert_eq!(resolution.resolved_path, "src/a.ts");
        assert_eq!(resolution.original_path, "./src/a.ts");
        assert!(!resolution.fuzzy_matched);
        assert_eq!(resolution.confidence, 100);
    }

    #[test]
    fn near_miss_resolves_by_similar_name() {
        let graph = snapshot(&["src/utils/helpers.ts", "src/index.ts"]);
        let resolution = resolve_default(&graph, "utils/helper.ts").expect("should resolve");

        assert_eq!(resolution.resolved_path, "src/utils/helpers.ts");
        assert!(resolution.fuzzy_matched);
        assert!(resolution.confidence >= 80);
        assert_eq!(resolution.suggestions[0].reason, MatchReason::SimilarName);
    }

    #[test]
    fn suffix_query_resolves_by_partial_path() {
        let graph = snapshot(&["packages/web/src/app.tsx", "packages/api/src/server.ts"]);
        let resolution = resolve_default(&graph, "web/src/app.tsx").expect("should resolve");

        assert_eq!(resolution.resolved_path, "packages/web/src/app.tsx");
        assert_eq!(resolution.suggestions[0].reason, MatchReason::PartialPath);
        assert!(resolution.confidence >= 90);
    }

    #[test]
    fn tied_candidates_are_suggested_not_chosen() {
        let graph = snapshot(&["a/index.ts", "b/index.ts"]);
        let err = resolve_default(&graph, "index.ts").expect_err("should not auto-resolve");

        let suggestions = err.suggestions();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].confidence, suggestions[1].confidence);
        assert_eq!(suggestions[0].path, "a/index.ts");
    }

    #[test]
    fn unrelated_query_reports_not_found() {
        let graph = snapshot(&["src/a.ts"]);
        let err = resolve_default(&graph, "docs/readme.md").expect_err("should fail");

        assert_eq!(err.code().as_str(), "FILE_NOT_FOUND");
        assert!(err.suggestions().is_empty());
    }

    #[test]
    fn suggestions_are_bounded_and_ranked() {
        let ids: Vec<String> = (0..10).map(|i| format!("src/mod{i}/helper.ts")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let graph = snapshot(&refs);

        let err = resolve_default(&graph, "helpr.ts").expect_err("should be ambiguous");
        let suggestions = err.suggestions();

        assert_eq!(suggestions.len(), 5);
        assert!(suggestions.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(suggestions[0].path, "src/mod0/helper.ts");
    }

    #[test]
    fn expired_deadline_times_out() {
        let graph = snapshot(&["src/a.ts"]);
        let err = resolve(
            &graph,
            "src/b.ts",
            Path::new("/ws"),
            &ImpactConfig::default(),
            &Deadline::new(Duration::ZERO),
        )
        .expect_err("should time out");

        assert_eq!(err.code().as_str(), "ANALYSIS_TIMEOUT");
    }

    #[rstest]
    #[case("kitten", "sitting", 3)]
    #[case("", "abc", 3)]
    #[case("same", "same", 0)]
    #[case("héllo", "hello", 1)]
    fn levenshtein_counts_edits(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(levenshtein(a, b), expected);
    }
}
