//! Depsight CLI - Dependency graph insights from the command line.
//!
//! Depsight loads a workspace's dependency graph from an external scanner (or a
//! pre-generated JSON file) and reports hubs, cycles, health and change impact.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use depsight::{ChangeType, EngineError};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{EngineArgs, Session};

/// Depsight: Dependency graph cache and analysis engine.
#[derive(Parser)]
#[command(name = "depsight")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    source: SourceArgs,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Ignore the cached graph and scan again
    #[arg(long, global = true)]
    force_refresh: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// External scanner command; {workspace_root} and {scan_path} are expanded
    #[arg(long, global = true, conflicts_with = "graph_file")]
    scanner_cmd: Option<String>,

    /// Pre-generated dependency graph (JSON), relative to the workspace
    #[arg(long, global = true)]
    graph_file: Option<PathBuf>,

    /// Per-file complexity/churn signals (JSON)
    #[arg(long, global = true)]
    signals: Option<PathBuf>,

    /// Config file (defaults to .depsight/config.yaml in the workspace)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show graph statistics, hubs, cycles and orphans
    Summary,

    /// Detect circular dependencies
    Cycles,

    /// Score file risk and overall workspace health
    Health,

    /// Analyze the impact of changing a file
    Impact {
        /// File path (workspace-relative or absolute; near misses are matched)
        target: String,

        /// Planned change: modify, delete or rename
        #[arg(short, long)]
        change: Option<ChangeType>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "depsight=warn",
        1 => "depsight=info",
        2 => "depsight=debug",
        _ => "depsight=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let workspace = match cli.workspace {
        Some(w) => w,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };

    let args = EngineArgs {
        scanner_cmd: cli.source.scanner_cmd,
        graph_file: cli.source.graph_file,
        signals: cli.source.signals,
        config: cli.source.config,
    };

    let result = match Session::open(workspace, &args, cli.force_refresh, cli.json).await {
        Ok(session) => match cli.command {
            Commands::Summary => cli::summary::run(&session).await,
            Commands::Cycles => cli::cycles::run(&session).await,
            Commands::Health => cli::health::run(&session).await,
            Commands::Impact { target, change } => {
                cli::impact::run(&session, &target, change).await
            }
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(engine_error) = e.downcast_ref::<EngineError>() {
                cli::print_error_report(&engine_error.report());
            } else {
                eprintln!("{}: {e}", "error".red().bold());
            }
            // Show cause chain for nested errors
            for cause in e.chain().skip(1) {
                eprintln!("  {}: {cause}", "caused by".dimmed());
            }
            ExitCode::FAILURE
        }
    }
}
