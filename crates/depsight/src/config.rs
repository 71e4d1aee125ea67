//! Engine configuration.
//!
//! Configuration lives in `.depsight/config.yaml` under the workspace root.
//! Every field has a default, so a missing file or a partial file is fine:
//!
//! ```yaml
//! scan:
//!   timeout_secs: 60
//! health:
//!   weights:
//!     structural: 0.5
//!     complexity: 0.3
//!     churn: 0.2
//! impact:
//!   auto_resolve_confidence: 85
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Name of the per-workspace configuration directory.
pub const CONFIG_DIR_NAME: &str = ".depsight";

/// Name of the configuration file inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Top-level configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache validation settings.
    pub cache: CacheConfig,
    /// External scanner settings.
    pub scan: ScanConfig,
    /// Insight engine settings.
    pub insights: InsightsConfig,
    /// Health scoring policy.
    pub health: HealthConfig,
    /// Impact analysis and fuzzy matching policy.
    pub impact: ImpactConfig,
}

/// Which files decide whether a cached graph is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Workspace-relative files whose modification invalidates the cache.
    pub key_files: Vec<PathBuf>,
    /// Also treat the workspace root directory's mtime as a key file.
    pub probe_workspace_root: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let key_files = [
            "package.json",
            "package-lock.json",
            "yarn.lock",
            "pnpm-lock.yaml",
            "tsconfig.json",
            "Cargo.toml",
            "Cargo.lock",
        ];
        Self {
            key_files: key_files.iter().map(PathBuf::from).collect(),
            probe_workspace_root: true,
        }
    }
}

/// External scanner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum time a single scan may take.
    pub timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl ScanConfig {
    /// The scan timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Insight engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// How many hubs to report.
    pub hub_limit: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self { hub_limit: 10 }
    }
}

/// Relative weight of each risk component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Weight of fan-in + fan-out.
    pub structural: f64,
    /// Weight of the complexity metric.
    pub complexity: f64,
    /// Weight of the churn metric.
    pub churn: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            structural: 0.4,
            complexity: 0.35,
            churn: 0.25,
        }
    }
}

impl RiskWeights {
    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.structural + self.complexity + self.churn
    }
}

/// Lower bounds (inclusive, on the 0-100 risk scale) of each risk tier above
/// `healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// Scores at or above this are at least `moderate`.
    pub moderate: f64,
    /// Scores at or above this are at least `risky`.
    pub risky: f64,
    /// Scores at or above this are `critical`.
    pub critical: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            moderate: 25.0,
            risky: 50.0,
            critical: 75.0,
        }
    }
}

/// Health scoring policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Component weights.
    pub weights: RiskWeights,
    /// Fan-in + fan-out at which the structural component saturates.
    pub structural_cap: f64,
    /// Complexity at which the complexity component saturates.
    pub complexity_cap: f64,
    /// Churn at which the churn component saturates.
    pub churn_cap: f64,
    /// Component value (0.0-1.0) used when a signal is unavailable.
    pub missing_signal_default: f64,
    /// Tier thresholds.
    pub tiers: TierThresholds,
    /// Share of critical files above which a recommendation is emitted.
    pub critical_share_warning: f64,
    /// Share of orphan files above which a recommendation is emitted.
    pub orphan_share_warning: f64,
    /// Maximum number of per-file entries in a health report.
    pub report_limit: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            structural_cap: 20.0,
            complexity_cap: 50.0,
            churn_cap: 30.0,
            missing_signal_default: 0.0,
            tiers: TierThresholds::default(),
            critical_share_warning: 0.2,
            orphan_share_warning: 0.25,
            report_limit: 20,
        }
    }
}

/// Impact analysis and fuzzy path matching policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Candidates below this confidence are not suggested.
    pub min_confidence: u8,
    /// A unique top candidate at or above this confidence is used directly.
    pub auto_resolve_confidence: u8,
    /// Maximum number of suggestions returned.
    pub max_suggestions: usize,
    /// Time budget for a single analysis, in milliseconds.
    pub analysis_timeout_ms: u64,
    /// Dependent count at which risk becomes `medium`.
    pub medium_risk_dependents: usize,
    /// Dependent count at which risk becomes `high`.
    pub high_risk_dependents: usize,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            min_confidence: 40,
            auto_resolve_confidence: 80,
            max_suggestions: 5,
            analysis_timeout_ms: 5_000,
            medium_risk_dependents: 3,
            high_risk_dependents: 10,
        }
    }
}

impl ImpactConfig {
    /// The analysis time budget as a [`Duration`].
    #[must_use]
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }
}

impl EngineConfig {
    /// Path of the configuration file for a workspace.
    #[must_use]
    pub fn path_for(workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Load the workspace's configuration, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file exists but cannot be parsed
    /// or fails validation, and `EngineError::Io` if it cannot be read.
    pub async fn load(workspace_root: &Path) -> Result<Self> {
        let path = Self::path_for(workspace_root);
        if !fs::try_exists(&path).await? {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path).await
    }

    /// Load configuration from an explicit file.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` for parse or validation failures and
    /// `EngineError::Io` if the file cannot be read.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Check that the policy values are usable.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let weights = &self.health.weights;
        if [weights.structural, weights.complexity, weights.churn]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(EngineError::Config(
                "risk weights must be finite and non-negative".to_string(),
            ));
        }
        if weights.total() <= 0.0 {
            return Err(EngineError::Config(
                "at least one risk weight must be positive".to_string(),
            ));
        }

        for (name, cap) in [
            ("structural_cap", self.health.structural_cap),
            ("complexity_cap", self.health.complexity_cap),
            ("churn_cap", self.health.churn_cap),
        ] {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(EngineError::Config(format!("{name} must be positive")));
            }
        }

        if !(0.0..=1.0).contains(&self.health.missing_signal_default) {
            return Err(EngineError::Config(
                "missing_signal_default must be between 0.0 and 1.0".to_string(),
            ));
        }

        let tiers = &self.health.tiers;
        if !(0.0 < tiers.moderate && tiers.moderate < tiers.risky && tiers.risky < tiers.critical)
        {
            return Err(EngineError::Config(
                "tier thresholds must be strictly increasing and positive".to_string(),
            ));
        }

        let impact = &self.impact;
        if impact.auto_resolve_confidence > 100 || impact.min_confidence > 100 {
            return Err(EngineError::Config(
                "confidence thresholds must be at most 100".to_string(),
            ));
        }
        if impact.auto_resolve_confidence < impact.min_confidence {
            return Err(EngineError::Config(
                "auto_resolve_confidence cannot be below min_confidence".to_string(),
            ));
        }
        if impact.high_risk_dependents < impact.medium_risk_dependents {
            return Err(EngineError::Config(
                "high_risk_dependents cannot be below medium_risk_dependents".to_string(),
            ));
        }

        if self.scan.timeout_secs == 0 {
            return Err(EngineError::Config(
                "scan timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}
