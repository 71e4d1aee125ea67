//! Per-file risk signals supplied by collaborators.
//!
//! Computing complexity or churn is someone else's job (a linter, `git log`).
//! The health analyzer only needs a lookup by file id, and treats a missing
//! entry as neutral.

use std::collections::HashMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{EngineError, Result};
use crate::model::normalize_id;

/// Raw risk metrics for a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileSignals {
    /// Complexity metric (e.g. cyclomatic complexity).
    #[serde(default)]
    pub complexity: Option<f64>,
    /// Change frequency (e.g. commits touching the file in a window).
    #[serde(default)]
    pub churn: Option<f64>,
}

/// Source of per-file risk signals.
pub trait RiskSignals: Send + Sync {
    /// Signals for a file id, or `None` when nothing is known about it.
    fn signals(&self, file_id: &str) -> Option<FileSignals>;
}

/// Provides no signals; every file gets the neutral default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

impl RiskSignals for NoSignals {
    fn signals(&self, _file_id: &str) -> Option<FileSignals> {
        None
    }
}

/// Signals held in memory, keyed by file id.
#[derive(Debug, Clone, Default)]
pub struct StaticRiskSignals {
    by_file: HashMap<String, FileSignals>,
}

impl StaticRiskSignals {
    /// Build from a map of file id to signals.
    #[must_use]
    pub fn new(by_file: HashMap<String, FileSignals>) -> Self {
        let by_file = by_file
            .into_iter()
            .map(|(id, signals)| (normalize_id(&id), signals))
            .collect();
        Self { by_file }
    }

    /// Load signals from a JSON object of the form
    /// `{"src/a.ts": {"complexity": 12, "churn": 3}}`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Io` if the file cannot be read and
    /// `EngineError::Config` if it is not in the expected shape.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read(path).await?;
        let by_file: HashMap<String, FileSignals> = serde_json::from_slice(&content)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Ok(Self::new(by_file))
    }

    /// Number of files with signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    /// Returns `true` if no file has signals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

impl RiskSignals for StaticRiskSignals {
    fn signals(&self, file_id: &str) -> Option<FileSignals> {
        self.by_file.get(file_id).copied()
    }
}
