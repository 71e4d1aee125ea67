//! Per-file risk scoring and workspace health.
//!
//! Each file gets a composite risk score in `[0, 100]` from three components,
//! each normalized to `[0, 1]` against a saturation cap:
//!
//! | Component  | Source                         | Default weight |
//! |------------|--------------------------------|----------------|
//! | structural | fan-in + fan-out from the graph | 0.40           |
//! | complexity | [`RiskSignals`]                | 0.35           |
//! | churn      | [`RiskSignals`]                | 0.25           |
//!
//! The score is the weighted mean of the components, scaled to 100. Files are
//! bucketed into [`RiskTier`]s and the tier counts produce a single
//! `health_score`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::debug;

use crate::config::HealthConfig;
use crate::insights::{self, NodeDegree};
use crate::model::GraphSnapshot;
use crate::signals::RiskSignals;

/// Raw signal at or above this share of its cap counts as "high" for the
/// hotspot recommendation.
const HOTSPOT_SHARE: f64 = 0.6;

/// Risk bucket of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Below the moderate threshold.
    Healthy,
    /// Between the moderate and risky thresholds.
    Moderate,
    /// Between the risky and critical thresholds.
    Risky,
    /// At or above the critical threshold.
    Critical,
}

impl RiskTier {
    /// How much one file in this tier lowers the health score, in `[0, 1]`.
    #[must_use]
    pub fn penalty(self) -> f64 {
        match self {
            Self::Healthy => 0.0,
            Self::Moderate => 1.0 / 3.0,
            Self::Risky => 2.0 / 3.0,
            Self::Critical => 1.0,
        }
    }

    /// Lowercase name, e.g. `"risky"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Moderate => "moderate",
            Self::Risky => "risky",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized component values behind a file's risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct RiskComponents {
    /// Connectivity, `[0, 1]`.
    pub structural: f64,
    /// Complexity, `[0, 1]`.
    pub complexity: f64,
    /// Churn, `[0, 1]`.
    pub churn: f64,
}

/// Risk assessment of one file.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FileRisk {
    /// Node id.
    pub id: String,
    /// Composite score in `[0, 100]`.
    pub risk_score: f64,
    /// Bucket for `risk_score`.
    pub tier: RiskTier,
    /// Number of dependents.
    pub fan_in: usize,
    /// Number of dependencies.
    pub fan_out: usize,
    /// Complexity signal, if one was supplied.
    pub complexity: Option<f64>,
    /// Churn signal, if one was supplied.
    pub churn: Option<f64>,
    /// Component breakdown.
    pub components: RiskComponents,
}

/// File counts per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct HealthDistribution {
    /// Files in [`RiskTier::Healthy`].
    pub healthy: usize,
    /// Files in [`RiskTier::Moderate`].
    pub moderate: usize,
    /// Files in [`RiskTier::Risky`].
    pub risky: usize,
    /// Files in [`RiskTier::Critical`].
    pub critical: usize,
    /// All scored files.
    pub total_files: usize,
}

impl HealthDistribution {
    fn record(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Healthy => self.healthy += 1,
            RiskTier::Moderate => self.moderate += 1,
            RiskTier::Risky => self.risky += 1,
            RiskTier::Critical => self.critical += 1,
        }
        self.total_files += 1;
    }

    /// Number of files in `tier`.
    #[must_use]
    pub fn count(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::Healthy => self.healthy,
            RiskTier::Moderate => self.moderate,
            RiskTier::Risky => self.risky,
            RiskTier::Critical => self.critical,
        }
    }

    /// `round(100 * (1 - Σ penalty × count / total))`; 100 for an empty graph.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn health_score(&self) -> u8 {
        if self.total_files == 0 {
            return 100;
        }
        let penalty: f64 = [
            RiskTier::Healthy,
            RiskTier::Moderate,
            RiskTier::Risky,
            RiskTier::Critical,
        ]
        .into_iter()
        .map(|tier| tier.penalty() * self.count(tier) as f64)
        .sum();

        let score = 100.0 * (1.0 - penalty / self.total_files as f64);
        score.round().clamp(0.0, 100.0) as u8
    }
}

/// What kind of problem a recommendation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// A highly connected file is also in the critical tier.
    SplitCriticalHub,
    /// Files participate in dependency cycles.
    BreakCycles,
    /// Too large a share of files is critical.
    ReduceCriticalFiles,
    /// Too large a share of files is unconnected.
    ReviewOrphans,
    /// A file changes often and is complex.
    StabilizeHotspot,
}

/// One suggested action.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Recommendation {
    /// The problem addressed.
    pub kind: RecommendationKind,
    /// Human-readable advice.
    pub message: String,
    /// Files the advice applies to, in id order.
    pub files: Vec<String>,
}

/// Recommendations, or an explicit statement that none are needed.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "status", content = "actions", rename_all = "snake_case")]
pub enum Recommendations {
    /// No pattern triggered.
    NoneNeeded,
    /// Actions in a fixed order: hubs, cycles, critical share, orphans, hotspots.
    Actions(Vec<Recommendation>),
}

impl Recommendations {
    /// The actions, empty for [`Recommendations::NoneNeeded`].
    #[must_use]
    pub fn actions(&self) -> &[Recommendation] {
        match self {
            Self::NoneNeeded => &[],
            Self::Actions(actions) => actions,
        }
    }
}

/// Full health assessment of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct HealthReport {
    /// Timestamp of the snapshot that was analyzed.
    pub snapshot_timestamp: DateTime<Utc>,
    /// Tier counts.
    pub distribution: HealthDistribution,
    /// Overall score in `[0, 100]`, higher is healthier.
    pub health_score: u8,
    /// Riskiest files first, ties by id, bounded by the report limit.
    pub riskiest_files: Vec<FileRisk>,
    /// Suggested actions.
    pub recommendations: Recommendations,
}

/// Scores files and builds [`HealthReport`]s.
#[derive(Debug, Clone)]
pub struct HealthAnalyzer {
    config: HealthConfig,
    hub_limit: usize,
}

impl HealthAnalyzer {
    /// Create an analyzer with the given policy. `hub_limit` bounds which hubs
    /// are checked for the critical-hub recommendation.
    #[must_use]
    pub fn new(config: HealthConfig, hub_limit: usize) -> Self {
        Self { config, hub_limit }
    }

    /// Tier for a composite score.
    #[must_use]
    pub fn tier_for(&self, score: f64) -> RiskTier {
        let tiers = &self.config.tiers;
        if score < tiers.moderate {
            RiskTier::Healthy
        } else if score < tiers.risky {
            RiskTier::Moderate
        } else if score < tiers.critical {
            RiskTier::Risky
        } else {
            RiskTier::Critical
        }
    }

    /// Score every file in `snapshot`, in id order.
    #[must_use]
    pub fn score_files(&self, snapshot: &GraphSnapshot, signals: &dyn RiskSignals) -> Vec<FileRisk> {
        insights::degrees(snapshot)
            .into_iter()
            .map(|(id, degree)| self.score_file(id, degree, signals))
            .collect()
    }

    /// Build the full health report.
    #[must_use]
    pub fn analyze(&self, snapshot: &GraphSnapshot, signals: &dyn RiskSignals) -> HealthReport {
        let files = self.score_files(snapshot, signals);

        let mut distribution = HealthDistribution::default();
        for file in &files {
            distribution.record(file.tier);
        }

        let recommendations = self.recommend(snapshot, &files, &distribution);

        let mut riskiest_files = files;
        riskiest_files.sort_by(|a, b| {
            b.risk_score
                .total_cmp(&a.risk_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        riskiest_files.truncate(self.config.report_limit);

        let health_score = distribution.health_score();
        debug!(
            files = distribution.total_files,
            critical = distribution.critical,
            health_score,
            "Computed workspace health"
        );

        HealthReport {
            snapshot_timestamp: snapshot.metadata().timestamp,
            distribution,
            health_score,
            riskiest_files,
            recommendations,
        }
    }

    fn score_file(&self, id: String, degree: NodeDegree, signals: &dyn RiskSignals) -> FileRisk {
        let config = &self.config;
        let file_signals = signals.signals(&id).unwrap_or_default();

        #[allow(clippy::cast_precision_loss)]
        let structural = saturate(degree.total() as f64, config.structural_cap);
        let complexity = file_signals
            .complexity
            .map_or(config.missing_signal_default, |c| saturate(c, config.complexity_cap));
        let churn = file_signals
            .churn
            .map_or(config.missing_signal_default, |c| saturate(c, config.churn_cap));

        let weights = &config.weights;
        let weighted = weights.structural * structural
            + weights.complexity * complexity
            + weights.churn * churn;
        let risk_score = (100.0 * weighted / weights.total()).clamp(0.0, 100.0);

        FileRisk {
            tier: self.tier_for(risk_score),
            id,
            risk_score,
            fan_in: degree.in_degree,
            fan_out: degree.out_degree,
            complexity: file_signals.complexity,
            churn: file_signals.churn,
            components: RiskComponents {
                structural,
                complexity,
                churn,
            },
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn recommend(
        &self,
        snapshot: &GraphSnapshot,
        files: &[FileRisk],
        distribution: &HealthDistribution,
    ) -> Recommendations {
        let config = &self.config;
        let mut actions = Vec::new();

        let critical: BTreeSet<&str> = files
            .iter()
            .filter(|f| f.tier == RiskTier::Critical)
            .map(|f| f.id.as_str())
            .collect();

        let critical_hubs: Vec<String> = insights::top_hubs(snapshot, self.hub_limit)
            .into_iter()
            .filter(|hub| critical.contains(hub.id.as_str()))
            .map(|hub| hub.id)
            .collect();
        if !critical_hubs.is_empty() {
            actions.push(Recommendation {
                kind: RecommendationKind::SplitCriticalHub,
                message: format!(
                    "{} highly connected file(s) are critical risk; split them or narrow their public surface",
                    critical_hubs.len()
                ),
                files: sorted(critical_hubs),
            });
        }

        let in_cycles: BTreeSet<String> = insights::circular_dependencies(snapshot)
            .into_iter()
            .flatten()
            .collect();
        if !in_cycles.is_empty() {
            actions.push(Recommendation {
                kind: RecommendationKind::BreakCycles,
                message: format!(
                    "{} file(s) are part of circular dependencies; extract shared code to break the cycles",
                    in_cycles.len()
                ),
                files: in_cycles.into_iter().collect(),
            });
        }

        let total = distribution.total_files as f64;
        if total > 0.0 && distribution.critical as f64 / total > config.critical_share_warning {
            actions.push(Recommendation {
                kind: RecommendationKind::ReduceCriticalFiles,
                message: format!(
                    "{:.0}% of files are critical risk; prioritize refactoring the riskiest ones",
                    100.0 * distribution.critical as f64 / total
                ),
                files: critical.iter().map(|id| (*id).to_string()).collect(),
            });
        }

        let orphans = insights::orphan_files(snapshot);
        if total > 0.0 && orphans.len() as f64 / total > config.orphan_share_warning {
            actions.push(Recommendation {
                kind: RecommendationKind::ReviewOrphans,
                message: format!(
                    "{} file(s) have no dependencies or dependents; check for dead code",
                    orphans.len()
                ),
                files: orphans,
            });
        }

        let hotspots: Vec<String> = files
            .iter()
            .filter(|f| {
                f.complexity
                    .is_some_and(|c| c >= HOTSPOT_SHARE * config.complexity_cap)
                    && f.churn.is_some_and(|c| c >= HOTSPOT_SHARE * config.churn_cap)
            })
            .map(|f| f.id.clone())
            .collect();
        if !hotspots.is_empty() {
            actions.push(Recommendation {
                kind: RecommendationKind::StabilizeHotspot,
                message: format!(
                    "{} file(s) change often and are complex; add tests before changing them again",
                    hotspots.len()
                ),
                files: hotspots,
            });
        }

        if actions.is_empty() {
            Recommendations::NoneNeeded
        } else {
            Recommendations::Actions(actions)
        }
    }
}

fn saturate(value: f64, cap: f64) -> f64 {
    if value.is_nan() || value <= 0.0 {
        return 0.0;
    }
    value.min(cap) / cap
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}
