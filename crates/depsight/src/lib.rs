//! # Depsight: Dependency Graph Cache and Analysis Engine
//!
//! Depsight keeps an in-memory, timestamped dependency graph per workspace and
//! answers architectural questions about it. The graph itself comes from an
//! external [`Scanner`](scanner::Scanner); depsight never parses source code.
//!
//! ## Design Philosophy
//!
//! - **One scan per workspace at a time** - concurrent requests share a single
//!   in-flight scan and its outcome, success or failure
//! - **Cheap reuse** - a cached snapshot is served until a key file (lockfile,
//!   manifest) changes
//! - **Deterministic answers** - hubs, cycles, orphans, health scores and
//!   impact narratives are stable for a given snapshot
//! - **Fail with a reason** - every error carries a stable code and recovery
//!   actions
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use depsight::{Engine, RequestOptions};
//! use depsight::scanner::JsonFileScanner;
//!
//! # async fn run() -> depsight::Result<()> {
//! let engine = Engine::builder(Arc::new(JsonFileScanner::new("deps.json"))).build()?;
//! let workspace = Path::new("/path/to/workspace");
//!
//! let summary = engine.get_summary(workspace, RequestOptions::default()).await?;
//! println!("{} files, {} cycles", summary.stats.node_count, summary.insights.circular_dependencies.len());
//!
//! let impact = engine
//!     .analyze_impact(workspace, "src/utils/helpers.ts", None, RequestOptions::default())
//!     .await?;
//! println!("{}", impact.summary);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod health;
pub mod impact;
pub mod insights;
pub mod model;
pub mod scanner;
pub mod signals;
pub mod store;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, GraphSummary, RequestOptions};
pub use error::{EngineError, ErrorCode, ErrorReport, Result, ScanError};
pub use health::{HealthReport, RiskTier};
pub use impact::{ChangeType, ImpactResult, RiskLevel};
pub use model::{Edge, GraphSnapshot, GraphWarning, Node, RawGraph, SnapshotMetadata};
pub use store::LoadedGraph;
