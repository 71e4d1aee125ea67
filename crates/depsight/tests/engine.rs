//! Caller-facing operations: caching, invalidation, summaries and health.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Duration as ChronoDuration;
use common::{Harness, cyclic_graph, sample_graph};
use depsight::health::{RecommendationKind, Recommendations};
use depsight::scanner::JsonFileScanner;
use depsight::signals::{FileSignals, StaticRiskSignals};
use depsight::{Engine, ErrorCode, RawGraph, RequestOptions};
use serde_json::json;

#[tokio::test]
async fn repeated_summaries_reuse_the_cache() {
    let harness = Harness::new(sample_graph());

    let first = harness
        .engine
        .get_summary(harness.root(), RequestOptions::default())
        .await
        .expect("first summary");
    let second = harness
        .engine
        .get_summary(harness.root(), RequestOptions::default())
        .await
        .expect("second summary");

    assert_eq!(harness.scanner.scan_count(), 1);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.metadata.timestamp, second.metadata.timestamp);
}

#[tokio::test]
async fn summary_reports_counts_hubs_orphans_and_packages() {
    let harness = Harness::new(sample_graph());

    let summary = harness
        .engine
        .get_summary(harness.root(), RequestOptions::default())
        .await
        .expect("summary");

    assert_eq!(summary.stats.node_count, 5);
    assert_eq!(summary.stats.edge_count, 4);
    assert_eq!(summary.insights.orphan_files, vec!["src/legacy/old.ts"]);
    assert!(summary.insights.circular_dependencies.is_empty());

    let hubs: Vec<(&str, usize)> = summary
        .insights
        .top_hubs
        .iter()
        .map(|h| (h.id.as_str(), h.connection_count))
        .collect();
    assert_eq!(
        hubs,
        vec![
            ("src/utils/helpers.ts", 3),
            ("src/app.ts", 2),
            ("src/pages/home.ts", 2),
            ("src/utils/format.ts", 1),
            ("src/legacy/old.ts", 0),
        ]
    );

    assert_eq!(summary.packages.get("web"), Some(&2));
    assert_eq!(summary.packages.get("shared"), Some(&2));
    assert_eq!(summary.warning_count, 0);
}

#[tokio::test]
async fn summary_reports_cycles() {
    let harness = Harness::new(cyclic_graph());

    let summary = harness
        .engine
        .get_summary(harness.root(), RequestOptions::default())
        .await
        .expect("summary");

    assert_eq!(
        summary.insights.circular_dependencies,
        vec![vec!["A", "B", "C"]]
    );
    assert!(summary.insights.orphan_files.is_empty());
}

#[tokio::test]
async fn malformed_scanner_entries_are_counted_not_fatal() {
    let harness = Harness::new(RawGraph {
        nodes: vec![json!("a.ts"), json!({"label": "no id"}), json!("b.ts")],
        edges: vec![
            json!({"source": "a.ts", "target": "b.ts"}),
            json!({"source": "a.ts", "target": "ghost.ts"}),
        ],
    });

    let summary = harness
        .engine
        .get_summary(harness.root(), RequestOptions::default())
        .await
        .expect("summary despite malformed entries");

    assert_eq!(summary.stats.node_count, 2);
    assert_eq!(summary.stats.edge_count, 1);
    assert_eq!(summary.warning_count, 2);
}

#[tokio::test]
async fn newer_key_file_triggers_rescan() {
    let harness = Harness::new(sample_graph());
    let options = RequestOptions::default();

    let first = harness
        .engine
        .load_graph(harness.root(), None, options)
        .await
        .expect("first load");

    // An older key file leaves the cache valid.
    harness
        .probe
        .touch(first.snapshot.metadata().timestamp - ChronoDuration::seconds(60));
    let cached = harness
        .engine
        .load_graph(harness.root(), None, options)
        .await
        .expect("cached load");
    assert!(cached.from_cache);

    harness
        .probe
        .touch(first.snapshot.metadata().timestamp + ChronoDuration::seconds(1));
    let rescanned = harness
        .engine
        .load_graph(harness.root(), None, options)
        .await
        .expect("rescan");

    assert!(!rescanned.from_cache);
    assert_eq!(harness.scanner.scan_count(), 2);
    assert!(rescanned.snapshot.metadata().timestamp >= first.snapshot.metadata().timestamp);
}

#[tokio::test]
async fn force_refresh_and_invalidate_both_rescan() {
    let harness = Harness::new(sample_graph());
    let root = harness.root();

    harness
        .engine
        .load_graph(root, None, RequestOptions::default())
        .await
        .expect("first load");

    let refreshed = harness
        .engine
        .get_summary(root, RequestOptions::refresh())
        .await
        .expect("refresh");
    assert!(!refreshed.from_cache);
    assert_eq!(harness.scanner.scan_count(), 2);

    assert!(harness.engine.invalidate(root).await.expect("invalidate"));
    assert!(
        harness
            .engine
            .cached_graph(root)
            .await
            .expect("root resolves")
            .is_none()
    );

    harness
        .engine
        .load_graph(root, None, RequestOptions::default())
        .await
        .expect("reload");
    assert_eq!(harness.scanner.scan_count(), 3);
}

#[tokio::test]
async fn failed_rescan_keeps_serving_previous_snapshot_from_cache() {
    let harness = Harness::new(sample_graph());
    let root = harness.root();

    let first = harness
        .engine
        .load_graph(root, None, RequestOptions::default())
        .await
        .expect("first load");

    harness
        .scanner
        .fail_with(depsight::ScanError::Failed("boom".to_string()));
    let err = harness
        .engine
        .load_graph(root, None, RequestOptions::refresh())
        .await
        .expect_err("refresh should fail");
    assert_eq!(err.code(), ErrorCode::ScanFailed);

    let cached = harness
        .engine
        .cached_graph(root)
        .await
        .expect("root resolves")
        .expect("previous snapshot kept");
    assert!(Arc::ptr_eq(&cached, &first.snapshot));
}

#[tokio::test]
async fn scan_path_must_be_inside_workspace() {
    let harness = Harness::new(sample_graph());
    std::fs::create_dir(harness.root().join("src")).expect("should create src");

    let loaded = harness
        .engine
        .load_graph(
            harness.root(),
            Some(std::path::Path::new("src")),
            RequestOptions::default(),
        )
        .await
        .expect("sub-directory scan");
    assert!(loaded.snapshot.metadata().scan_path.ends_with("src"));

    let err = harness
        .engine
        .load_graph(
            harness.root(),
            Some(std::path::Path::new("..")),
            RequestOptions::default(),
        )
        .await
        .expect_err("parent directory is outside");
    assert_eq!(err.code(), ErrorCode::WorkspaceBoundaryViolation);
}

#[tokio::test]
async fn missing_workspace_is_reported_with_code() {
    let harness = Harness::new(sample_graph());
    let missing = harness.root().join("does-not-exist");

    let err = harness
        .engine
        .get_summary(&missing, RequestOptions::default())
        .await
        .expect_err("missing workspace");

    assert_eq!(err.code(), ErrorCode::WorkspaceNotFound);
    assert_eq!(harness.scanner.scan_count(), 0);
}

#[tokio::test]
async fn health_report_uses_risk_signals() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let scanner = common::MockScanner::new(sample_graph());
    let signals = StaticRiskSignals::new(HashMap::from([(
        "src/utils/helpers.ts".to_string(),
        FileSignals {
            complexity: Some(50.0),
            churn: Some(30.0),
        },
    )]));
    let engine = Engine::builder(scanner)
        .probe(Arc::new(common::ManualProbe::default()))
        .signals(Arc::new(signals))
        .build()
        .expect("engine builds");

    let report = engine
        .get_health_report(dir.path(), RequestOptions::default())
        .await
        .expect("health report");

    assert_eq!(report.distribution.total_files, 5);
    assert_eq!(report.riskiest_files[0].id, "src/utils/helpers.ts");
    assert_eq!(report.riskiest_files[0].complexity, Some(50.0));

    let kinds: Vec<RecommendationKind> = match &report.recommendations {
        Recommendations::NoneNeeded => Vec::new(),
        Recommendations::Actions(actions) => actions.iter().map(|a| a.kind).collect(),
    };
    assert!(kinds.contains(&RecommendationKind::StabilizeHotspot));
    assert!(report.health_score <= 100);
}

#[tokio::test]
async fn json_graph_file_with_filesystem_probe() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let root = dir.path();
    std::fs::write(
        root.join("graph.json"),
        serde_json::to_vec(&json!({
            "nodes": ["src/a.ts", "src/b.ts"],
            "edges": [{"source": "src/a.ts", "target": "src/b.ts"}]
        }))
        .expect("serialize graph"),
    )
    .expect("write graph");
    let manifest = root.join("package.json");
    std::fs::write(&manifest, "{}").expect("write manifest");
    set_mtime(&manifest, SystemTime::now() - Duration::from_secs(3600));
    set_mtime(root, SystemTime::now() - Duration::from_secs(3600));

    let engine = Engine::builder(Arc::new(JsonFileScanner::new("graph.json")))
        .build()
        .expect("engine builds");

    let first = engine
        .load_graph(root, None, RequestOptions::default())
        .await
        .expect("first load");
    let second = engine
        .load_graph(root, None, RequestOptions::default())
        .await
        .expect("second load");
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.snapshot.edge_count(), 1);

    set_mtime(&manifest, SystemTime::now() + Duration::from_secs(60));
    let third = engine
        .load_graph(root, None, RequestOptions::default())
        .await
        .expect("third load");
    assert!(!third.from_cache);
}

fn set_mtime(path: &std::path::Path, at: SystemTime) {
    std::fs::File::open(path)
        .and_then(|file| file.set_modified(at))
        .expect("should set mtime");
}
