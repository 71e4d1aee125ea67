//! The external scanner boundary.
//!
//! A [`Scanner`] walks a workspace and returns a flat node/edge list as
//! [`RawGraph`]. It may be slow and it may fail; the engine never inspects
//! source code itself.
//!
//! Two adapters are provided:
//!
//! - [`CommandScanner`] runs an external executable and parses its stdout.
//! - [`JsonFileScanner`] reads a graph that was generated ahead of time.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ScanError;
use crate::model::RawGraph;

/// Placeholder replaced with the workspace root in [`CommandScanner`] arguments.
pub const WORKSPACE_ROOT_PLACEHOLDER: &str = "{workspace_root}";

/// Placeholder replaced with the scan path in [`CommandScanner`] arguments.
pub const SCAN_PATH_PLACEHOLDER: &str = "{scan_path}";

/// Maximum number of stderr bytes carried into a failure message.
const MAX_STDERR_BYTES: usize = 2048;

/// Produces the raw dependency graph of a workspace.
///
/// Implementations must be `Send + Sync`; one scanner is shared by every
/// workspace the engine serves.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan `scan_path` (inside `workspace_root`) and return its dependencies.
    async fn scan(&self, workspace_root: &Path, scan_path: &Path) -> Result<RawGraph, ScanError>;
}

/// Runs an external scanner executable that prints a JSON graph on stdout.
///
/// The child is killed if the scan future is dropped (for example when the
/// scan times out).
#[derive(Debug, Clone)]
pub struct CommandScanner {
    program: String,
    args: Vec<String>,
}

impl CommandScanner {
    /// Create a scanner for `program` with the given arguments. Arguments may
    /// contain [`WORKSPACE_ROOT_PLACEHOLDER`] and [`SCAN_PATH_PLACEHOLDER`].
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build a scanner from a whitespace-separated command line.
    ///
    /// Returns `None` for an empty command line.
    #[must_use]
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn expand_args(&self, workspace_root: &Path, scan_path: &Path) -> Vec<String> {
        let root = workspace_root.display().to_string();
        let scan = scan_path.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(WORKSPACE_ROOT_PLACEHOLDER, &root)
                    .replace(SCAN_PATH_PLACEHOLDER, &scan)
            })
            .collect()
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    async fn scan(&self, workspace_root: &Path, scan_path: &Path) -> Result<RawGraph, ScanError> {
        let args = self.expand_args(workspace_root, scan_path);
        debug!(program = %self.program, ?args, "Running external scanner");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(workspace_root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ScanError::Failed(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = tail_bytes(stderr.trim(), MAX_STDERR_BYTES);
            return Err(ScanError::Failed(format!(
                "{} exited with {}: {tail}",
                self.program, output.status
            )));
        }

        parse_raw_graph(&output.stdout)
    }
}

/// Reads a pre-generated JSON graph from disk.
///
/// Relative paths are resolved against the workspace root at scan time.
#[derive(Debug, Clone)]
pub struct JsonFileScanner {
    path: PathBuf,
}

impl JsonFileScanner {
    /// Create a scanner that reads `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Scanner for JsonFileScanner {
    async fn scan(&self, workspace_root: &Path, _scan_path: &Path) -> Result<RawGraph, ScanError> {
        let path = workspace_root.join(&self.path);
        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| ScanError::Failed(format!("cannot read {}: {e}", path.display())))?;
        parse_raw_graph(&content)
    }
}

fn parse_raw_graph(bytes: &[u8]) -> Result<RawGraph, ScanError> {
    serde_json::from_slice(bytes).map_err(|e| ScanError::InvalidOutput(e.to_string()))
}

fn tail_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
