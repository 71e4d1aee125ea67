//! Cache validity decisions.
//!
//! [`validate`] is pure: it compares a snapshot's timestamp with modification
//! times that a [`KeyFileProbe`] collected beforehand. Keeping the filesystem
//! out of the decision makes it deterministic to test.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::debug;

use crate::config::CacheConfig;
use crate::model::GraphSnapshot;

/// Outcome of a single cache validity check. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CacheValidation {
    /// Whether the cached snapshot can be reused.
    pub is_valid: bool,
    /// Why the cache was rejected.
    pub reason: Option<String>,
    /// Timestamp of the cached snapshot, if one exists.
    pub cache_timestamp: Option<DateTime<Utc>>,
    /// Newest key-file modification time that was considered.
    pub key_file_timestamp: Option<DateTime<Utc>>,
}

/// Decide whether `cached` is still usable.
///
/// The cache is stale when any key-file timestamp is strictly newer than the
/// snapshot timestamp. An equal timestamp keeps the cache valid.
#[must_use]
pub fn validate(
    cached: Option<&GraphSnapshot>,
    key_file_timestamps: &[DateTime<Utc>],
) -> CacheValidation {
    let Some(snapshot) = cached else {
        return CacheValidation {
            is_valid: false,
            reason: Some("no cache".to_string()),
            cache_timestamp: None,
            key_file_timestamp: None,
        };
    };

    let cache_timestamp = snapshot.metadata().timestamp;
    let newest = key_file_timestamps.iter().max().copied();

    match newest {
        Some(key_file) if key_file > cache_timestamp => CacheValidation {
            is_valid: false,
            reason: Some(format!(
                "key file modified at {} after the graph was scanned at {}",
                key_file.to_rfc3339(),
                cache_timestamp.to_rfc3339()
            )),
            cache_timestamp: Some(cache_timestamp),
            key_file_timestamp: Some(key_file),
        },
        _ => CacheValidation {
            is_valid: true,
            reason: None,
            cache_timestamp: Some(cache_timestamp),
            key_file_timestamp: newest,
        },
    }
}

/// Collects the modification times relevant to a workspace's dependency
/// structure (lockfiles, manifests, the root directory itself).
pub trait KeyFileProbe: Send + Sync {
    /// Modification times for the workspace's key files. Files that do not
    /// exist are simply absent from the result.
    fn timestamps(&self, workspace_root: &Path) -> Vec<DateTime<Utc>>;
}

/// Reads key-file modification times from the local filesystem.
#[derive(Debug, Clone)]
pub struct FsKeyFileProbe {
    key_files: Vec<PathBuf>,
    probe_workspace_root: bool,
}

impl FsKeyFileProbe {
    /// Create a probe for the given workspace-relative key files.
    #[must_use]
    pub fn new(key_files: Vec<PathBuf>, probe_workspace_root: bool) -> Self {
        Self {
            key_files,
            probe_workspace_root,
        }
    }

    /// Create a probe from the cache section of the engine configuration.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.key_files.clone(), config.probe_workspace_root)
    }
}

impl KeyFileProbe for FsKeyFileProbe {
    fn timestamps(&self, workspace_root: &Path) -> Vec<DateTime<Utc>> {
        let root = self
            .probe_workspace_root
            .then(|| workspace_root.to_path_buf());
        let candidates = self
            .key_files
            .iter()
            .map(|relative| workspace_root.join(relative))
            .chain(root);

        candidates
            .filter_map(|path| match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => Some(DateTime::<Utc>::from(modified)),
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        debug!(path = %path.display(), error = %e, "Cannot read key file mtime, skipping");
                    }
                    None
                }
            })
            .collect()
    }
}
