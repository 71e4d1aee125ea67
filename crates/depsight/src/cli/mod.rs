//! CLI command implementations.

mod display;

pub mod cycles;
pub mod health;
pub mod impact;
pub mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use depsight::config::CONFIG_DIR_NAME;
use depsight::scanner::{CommandScanner, JsonFileScanner, Scanner};
use depsight::signals::StaticRiskSignals;
use depsight::{Engine, EngineConfig, RequestOptions};
use tracing::debug;

pub use display::print_error_report;

/// Graph file read when neither `--scanner-cmd` nor `--graph-file` is given.
const DEFAULT_GRAPH_FILE: &str = "graph.json";

/// How the engine is assembled from command-line flags.
#[derive(Debug, Default)]
pub struct EngineArgs {
    /// External scanner command line.
    pub scanner_cmd: Option<String>,
    /// Pre-generated graph file.
    pub graph_file: Option<PathBuf>,
    /// JSON file with per-file complexity and churn.
    pub signals: Option<PathBuf>,
    /// Explicit config file instead of `.depsight/config.yaml`.
    pub config: Option<PathBuf>,
}

/// Everything a command needs to run.
pub struct Session {
    /// The engine.
    pub engine: Engine,
    /// Workspace root as given on the command line.
    pub workspace: PathBuf,
    /// Per-request flags.
    pub options: RequestOptions,
    /// Emit JSON instead of colored text.
    pub json: bool,
}

impl Session {
    /// Build a session for `workspace`.
    pub async fn open(
        workspace: PathBuf,
        args: &EngineArgs,
        force_refresh: bool,
        json: bool,
    ) -> anyhow::Result<Self> {
        let engine = build_engine(&workspace, args).await?;
        Ok(Self {
            engine,
            workspace,
            options: RequestOptions { force_refresh },
            json,
        })
    }
}

async fn build_engine(workspace: &Path, args: &EngineArgs) -> anyhow::Result<Engine> {
    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path).await?,
        None => EngineConfig::load(workspace).await?,
    };

    let scanner: Arc<dyn Scanner> = match (&args.scanner_cmd, &args.graph_file) {
        (Some(_), Some(_)) => bail!("--scanner-cmd and --graph-file cannot be used together"),
        (Some(command_line), None) => {
            let scanner = CommandScanner::from_command_line(command_line)
                .context("--scanner-cmd must not be empty")?;
            Arc::new(scanner)
        }
        (None, Some(path)) => Arc::new(JsonFileScanner::new(path)),
        (None, None) => {
            let path = Path::new(CONFIG_DIR_NAME).join(DEFAULT_GRAPH_FILE);
            debug!(path = %path.display(), "No scanner given, reading default graph file");
            Arc::new(JsonFileScanner::new(path))
        }
    };

    let mut builder = Engine::builder(scanner).config(config);
    if let Some(path) = &args.signals {
        let signals = StaticRiskSignals::load(path)
            .await
            .with_context(|| format!("failed to load risk signals from {}", path.display()))?;
        debug!(files = signals.len(), "Loaded risk signals");
        builder = builder.signals(Arc::new(signals));
    }

    Ok(builder.build()?)
}
