//! Shared test helpers for depsight integration tests.
//!
//! Provides a scriptable scanner that counts invocations and a key-file probe
//! whose timestamps the test controls.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depsight::cache::KeyFileProbe;
use depsight::config::EngineConfig;
use depsight::scanner::Scanner;
use depsight::{Engine, RawGraph, ScanError};
use serde_json::json;
use tempfile::TempDir;

/// Scanner returning a fixed graph, optionally slowly or with a failure.
pub struct MockScanner {
    scans: AtomicUsize,
    graph: Mutex<RawGraph>,
    delay: Mutex<Option<Duration>>,
    failure: Mutex<Option<ScanError>>,
}

impl MockScanner {
    /// A scanner that returns `graph`.
    pub fn new(graph: RawGraph) -> Arc<Self> {
        Arc::new(Self {
            scans: AtomicUsize::new(0),
            graph: Mutex::new(graph),
            delay: Mutex::new(None),
            failure: Mutex::new(None),
        })
    }

    /// Number of times `scan` has been called.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Sleep this long inside every scan.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay lock") = Some(delay);
    }

    /// Fail every scan with `error` (after the delay).
    pub fn fail_with(&self, error: ScanError) {
        *self.failure.lock().expect("failure lock") = Some(error);
    }

    /// Return `graph` from now on.
    pub fn set_graph(&self, graph: RawGraph) {
        *self.graph.lock().expect("graph lock") = graph;
    }
}

#[async_trait]
impl Scanner for MockScanner {
    async fn scan(&self, _workspace_root: &Path, _scan_path: &Path) -> Result<RawGraph, ScanError> {
        self.scans.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().expect("failure lock").clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(self.graph.lock().expect("graph lock").clone())
    }
}

/// Key-file probe with test-controlled timestamps.
#[derive(Default)]
pub struct ManualProbe {
    timestamps: Mutex<Vec<DateTime<Utc>>>,
}

impl ManualProbe {
    /// Pretend a key file was modified at `at`.
    pub fn touch(&self, at: DateTime<Utc>) {
        self.timestamps.lock().expect("probe lock").push(at);
    }
}

impl KeyFileProbe for ManualProbe {
    fn timestamps(&self, _workspace_root: &Path) -> Vec<DateTime<Utc>> {
        self.timestamps.lock().expect("probe lock").clone()
    }
}

/// A small web-app graph:
///
/// - `src/app.ts` imports `src/utils/helpers.ts` and `src/pages/home.ts`
/// - `src/pages/home.ts` imports `src/utils/helpers.ts`
/// - `src/utils/helpers.ts` imports `src/utils/format.ts`
/// - `src/legacy/old.ts` is an orphan
pub fn sample_graph() -> RawGraph {
    RawGraph {
        nodes: vec![
            json!({"id": "src/app.ts", "package": "web"}),
            json!({"id": "src/pages/home.ts", "package": "web"}),
            json!({"id": "src/utils/helpers.ts", "package": "shared"}),
            json!({"id": "src/utils/format.ts", "package": "shared"}),
            json!("src/legacy/old.ts"),
        ],
        edges: vec![
            json!({"source": "src/app.ts", "target": "src/utils/helpers.ts"}),
            json!({"source": "src/app.ts", "target": "src/pages/home.ts"}),
            json!({"source": "src/pages/home.ts", "target": "src/utils/helpers.ts"}),
            json!({"source": "src/utils/helpers.ts", "target": "src/utils/format.ts"}),
        ],
    }
}

/// A graph with a three-file cycle.
pub fn cyclic_graph() -> RawGraph {
    RawGraph {
        nodes: vec![json!("A"), json!("B"), json!("C")],
        edges: vec![
            json!({"source": "A", "target": "B"}),
            json!({"source": "B", "target": "C"}),
            json!({"source": "C", "target": "A"}),
        ],
    }
}

/// Everything an engine test needs.
pub struct Harness {
    /// Keeps the workspace directory alive.
    pub dir: TempDir,
    /// The engine under test.
    pub engine: Engine,
    /// The scanner behind the engine.
    pub scanner: Arc<MockScanner>,
    /// The probe behind the engine.
    pub probe: Arc<ManualProbe>,
}

impl Harness {
    /// An engine over a fresh temp workspace with default config.
    pub fn new(graph: RawGraph) -> Self {
        Self::with_config(graph, EngineConfig::default())
    }

    /// An engine over a fresh temp workspace with `config`.
    pub fn with_config(graph: RawGraph, config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let scanner = MockScanner::new(graph);
        let probe = Arc::new(ManualProbe::default());
        let engine = Engine::builder(scanner.clone())
            .config(config)
            .probe(probe.clone())
            .build()
            .expect("config should be valid");

        Self {
            dir,
            engine,
            scanner,
            probe,
        }
    }

    /// The workspace root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
