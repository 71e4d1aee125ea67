//! Error types for depsight operations.
//!
//! Errors fall into three groups:
//!
//! - **`ScanError`**: the external scanner failed, timed out, or was cancelled.
//!   It is `Clone` because a single scan outcome is handed to every caller
//!   waiting on the same workspace.
//! - **`EngineError`**: everything a caller-facing operation can fail with.
//!   Each variant maps to a stable [`ErrorCode`].
//! - **Graph warnings** (see [`crate::model::GraphWarning`]): malformed scanner
//!   data that is dropped rather than reported as an error.
//!
//! ## Error Philosophy
//!
//! Callers never receive a bare error string. [`EngineError::report`] turns any
//! failure into an [`ErrorReport`] carrying a code, a message, recovery actions
//! and (for path resolution failures) ranked suggestions.

use std::path::PathBuf;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impact::PathSuggestion;

/// Result type for depsight operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure of the external dependency scanner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The scanner ran but reported a failure.
    #[error("scanner failed: {0}")]
    Failed(String),

    /// The scanner did not finish within the configured timeout.
    #[error("scan timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    /// The scan was cancelled before it produced a result.
    #[error("scan cancelled: {0}")]
    Cancelled(String),

    /// The scanner finished but its output could not be understood.
    #[error("scanner produced invalid output: {0}")]
    InvalidOutput(String),
}

/// Top-level error type for caller-facing operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The external scan failed; shared verbatim by all waiting callers.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The workspace root does not exist or cannot be resolved.
    #[error("workspace not found: {path}")]
    WorkspaceNotFound {
        /// The path that was requested.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// No graph node matches the requested file, even approximately.
    #[error("file not found in dependency graph: {path}")]
    FileNotFound {
        /// The path as the caller supplied it.
        path: String,
        /// Ranked alternatives the caller may offer instead.
        suggestions: Vec<PathSuggestion>,
    },

    /// The requested path is syntactically unusable.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The path as the caller supplied it.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A relative path uses `..` to climb above the workspace root.
    #[error("path '{path}' escapes the workspace root")]
    PathSecurity {
        /// The path as the caller supplied it.
        path: String,
    },

    /// An absolute path points outside the workspace root.
    #[error("path '{path}' is outside workspace {}", workspace_root.display())]
    WorkspaceBoundaryViolation {
        /// The path as the caller supplied it.
        path: String,
        /// The workspace the request was scoped to.
        workspace_root: PathBuf,
    },

    /// Graph traversal or path matching took longer than allowed.
    #[error("impact analysis exceeded {} ms", limit.as_millis())]
    AnalysisTimeout {
        /// The configured limit.
        limit: Duration,
    },

    /// Invalid configuration file or values.
    #[error("configuration error: {0}")]
    Config(String),

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, machine-readable error codes exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Scanner reported failure or unusable output.
    ScanFailed,
    /// Scanner exceeded its timeout.
    ScanTimeout,
    /// Scan was cancelled.
    ScanCancelled,
    /// Workspace root could not be resolved.
    WorkspaceNotFound,
    /// File did not resolve to a graph node.
    FileNotFound,
    /// Path was empty or malformed.
    InvalidPath,
    /// Relative path escaped the workspace.
    PathSecurity,
    /// Absolute path lies outside the workspace.
    WorkspaceBoundaryViolation,
    /// Analysis exceeded its time budget.
    AnalysisTimeout,
    /// Configuration was rejected.
    Configuration,
    /// Local I/O failed.
    Io,
}

impl ErrorCode {
    /// The wire representation of this code, e.g. `"PATH_SECURITY"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScanFailed => "SCAN_FAILED",
            Self::ScanTimeout => "SCAN_TIMEOUT",
            Self::ScanCancelled => "SCAN_CANCELLED",
            Self::WorkspaceNotFound => "WORKSPACE_NOT_FOUND",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::InvalidPath => "INVALID_PATH",
            Self::PathSecurity => "PATH_SECURITY",
            Self::WorkspaceBoundaryViolation => "WORKSPACE_BOUNDARY_VIOLATION",
            Self::AnalysisTimeout => "ANALYSIS_TIMEOUT",
            Self::Configuration => "CONFIGURATION",
            Self::Io => "IO",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure handed to the UI or protocol layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorReport {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Things the user can do next.
    pub recovery_actions: Vec<String>,
    /// Alternative files, for path resolution failures.
    pub suggestions: Vec<PathSuggestion>,
}

impl ScanError {
    /// The error code for this scan failure.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Failed(_) | Self::InvalidOutput(_) => ErrorCode::ScanFailed,
            Self::TimedOut(_) => ErrorCode::ScanTimeout,
            Self::Cancelled(_) => ErrorCode::ScanCancelled,
        }
    }
}

impl EngineError {
    /// The error code for this failure.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Scan(e) => e.code(),
            Self::WorkspaceNotFound { .. } => ErrorCode::WorkspaceNotFound,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::InvalidPath { .. } => ErrorCode::InvalidPath,
            Self::PathSecurity { .. } => ErrorCode::PathSecurity,
            Self::WorkspaceBoundaryViolation { .. } => ErrorCode::WorkspaceBoundaryViolation,
            Self::AnalysisTimeout { .. } => ErrorCode::AnalysisTimeout,
            Self::Config(_) => ErrorCode::Configuration,
            Self::Io(_) => ErrorCode::Io,
        }
    }

    /// Returns `true` if the request was refused for leaving the workspace.
    ///
    /// Security failures are never retried or corrected automatically.
    #[must_use]
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::PathSecurity { .. } | Self::WorkspaceBoundaryViolation { .. }
        )
    }

    /// Suggestions attached to a path resolution failure.
    #[must_use]
    pub fn suggestions(&self) -> &[PathSuggestion] {
        match self {
            Self::FileNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// Recovery actions a user can take for this failure.
    #[must_use]
    pub fn recovery_actions(&self) -> Vec<String> {
        let actions: &[&str] = match self {
            Self::Scan(ScanError::TimedOut(_)) => &[
                "Retry the scan; large workspaces may need a longer scan timeout",
                "Narrow the scan path to a sub-directory",
            ],
            Self::Scan(ScanError::Cancelled(_)) => &["Run the scan again"],
            Self::Scan(_) => &[
                "Check that the dependency scanner is installed and runnable",
                "Retry the scan; previously cached results are still available",
            ],
            Self::WorkspaceNotFound { .. } => &["Open an existing workspace folder"],
            Self::FileNotFound { suggestions, .. } if !suggestions.is_empty() => {
                &["Pick one of the suggested files", "Rescan if the file was just created"]
            }
            Self::FileNotFound { .. } => &[
                "Check the file path",
                "Rescan if the file was just created",
            ],
            Self::InvalidPath { .. } => &["Provide a workspace-relative file path"],
            Self::PathSecurity { .. } | Self::WorkspaceBoundaryViolation { .. } => {
                &["Choose a file inside the current workspace"]
            }
            Self::AnalysisTimeout { .. } => &[
                "Retry with a more specific file path",
                "Increase the analysis timeout",
            ],
            Self::Config(_) => &["Fix .depsight/config.yaml or remove it to use defaults"],
            Self::Io(_) => &["Check file permissions and retry"],
        };
        actions.iter().map(|a| (*a).to_string()).collect()
    }

    /// Convert into the structured report shown to hosts.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            recovery_actions: self.recovery_actions(),
            suggestions: self.suggestions().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::MatchReason;

    #[test]
    fn scan_errors_map_to_distinct_codes() {
        assert_eq!(ScanError::Failed("x".into()).code(), ErrorCode::ScanFailed);
        assert_eq!(
            ScanError::InvalidOutput("x".into()).code(),
            ErrorCode::ScanFailed
        );
        assert_eq!(
            ScanError::TimedOut(Duration::from_secs(1)).code(),
            ErrorCode::ScanTimeout
        );
        assert_eq!(
            ScanError::Cancelled("x".into()).code(),
            ErrorCode::ScanCancelled
        );
    }

    #[test]
    fn analysis_timeout_is_distinct_from_scan_timeout() {
        let analysis = EngineError::AnalysisTimeout {
            limit: Duration::from_millis(10),
        };
        let scan = EngineError::Scan(ScanError::TimedOut(Duration::from_secs(1)));

        assert_ne!(analysis.code(), scan.code());
    }

    #[test]
    fn report_carries_suggestions_for_file_not_found() {
        let error = EngineError::FileNotFound {
            path: "src/hlpers.ts".to_string(),
            suggestions: vec![PathSuggestion {
                path: "src/helpers.ts".to_string(),
                confidence: 72,
                reason: MatchReason::SimilarName,
            }],
        };

        let report = error.report();
        assert_eq!(report.code, ErrorCode::FileNotFound);
        assert_eq!(report.suggestions.len(), 1);
        assert!(report.message.contains("src/hlpers.ts"));
        assert!(!report.recovery_actions.is_empty());
    }

    #[test]
    fn security_violations_are_flagged() {
        let error = EngineError::PathSecurity {
            path: "../../etc/passwd".to_string(),
        };
        assert!(error.is_security_violation());
        assert_eq!(error.report().code.as_str(), "PATH_SECURITY");
    }

    #[test]
    fn error_code_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::WorkspaceBoundaryViolation)
            .expect("code should serialize");
        assert_eq!(json, "\"WORKSPACE_BOUNDARY_VIOLATION\"");
    }
}
