//! Phase and report types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{LensError, Result};
use super::issue::{ClassifiedIssue, IssueType, Severity, SeverityCounts};

// =============================================================================
// Analysis Phase
// =============================================================================

/// One independent analysis pass over a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisPhase {
    Structure,
    Security,
    Performance,
    Comprehensive,
    Logic,
    Validation,
}

impl AnalysisPhase {
    pub const ALL: [AnalysisPhase; 6] = [
        AnalysisPhase::Structure,
        AnalysisPhase::Security,
        AnalysisPhase::Performance,
        AnalysisPhase::Comprehensive,
        AnalysisPhase::Logic,
        AnalysisPhase::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "STRUCTURE",
            Self::Security => "SECURITY",
            Self::Performance => "PERFORMANCE",
            Self::Comprehensive => "COMPREHENSIVE",
            Self::Logic => "LOGIC",
            Self::Validation => "VALIDATION",
        }
    }

    /// Top-level key holding the issue array in this phase's model output.
    /// `None` for the comprehensive phase, which has its own shape.
    pub fn issue_key(&self) -> Option<&'static str> {
        match self {
            Self::Structure => Some("structureIssues"),
            Self::Security => Some("securityIssues"),
            Self::Performance => Some("performanceIssues"),
            Self::Logic => Some("logicIssues"),
            Self::Validation => Some("validationIssues"),
            Self::Comprehensive => None,
        }
    }

    /// Raw type label stamped on issues decoded for this phase.
    pub fn issue_type(&self) -> IssueType {
        match self {
            Self::Structure | Self::Comprehensive => IssueType::Structure,
            Self::Security => IssueType::Security,
            Self::Performance => IssueType::Performance,
            Self::Logic => IssueType::LogicError,
            Self::Validation => IssueType::Validation,
        }
    }

    /// Severity of the placeholder issue emitted when this phase degrades.
    pub fn degraded_severity(&self) -> Severity {
        match self {
            Self::Security | Self::Logic => Severity::High,
            _ => Severity::Medium,
        }
    }

    pub fn is_comprehensive(&self) -> bool {
        matches!(self, Self::Comprehensive)
    }

    pub fn status_label(&self) -> super::run::RunStatus {
        use super::run::RunStatus;
        match self {
            Self::Structure => RunStatus::StructureAnalysis,
            Self::Security => RunStatus::SecurityAnalysis,
            Self::Performance => RunStatus::PerformanceAnalysis,
            Self::Comprehensive => RunStatus::ComprehensiveAnalysis,
            Self::Logic => RunStatus::LogicAnalysis,
            Self::Validation => RunStatus::ValidationAnalysis,
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisPhase {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "structure" => Ok(Self::Structure),
            "security" => Ok(Self::Security),
            "performance" => Ok(Self::Performance),
            "comprehensive" => Ok(Self::Comprehensive),
            "logic" => Ok(Self::Logic),
            "validation" => Ok(Self::Validation),
            _ => Err(LensError::Config(format!(
                "Unknown analysis phase '{}'. Valid values: structure, security, performance, comprehensive, logic, validation",
                s
            ))),
        }
    }
}

// =============================================================================
// Phase Set
// =============================================================================

/// Ordered, duplicate-free set of phases. Part of the report cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhaseSet(BTreeSet<AnalysisPhase>);

impl PhaseSet {
    /// Structure, security, performance, and comprehensive.
    pub fn canonical() -> Self {
        Self::from_iter([
            AnalysisPhase::Structure,
            AnalysisPhase::Security,
            AnalysisPhase::Performance,
            AnalysisPhase::Comprehensive,
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = AnalysisPhase> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, phase: AnalysisPhase) -> bool {
        self.0.contains(&phase)
    }

    /// Stable textual form, e.g. `STRUCTURE+SECURITY`.
    pub fn key(&self) -> String {
        self.iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Parse configuration names. Rejects unknown names and empty lists.
    pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let set = names
            .iter()
            .map(|n| n.as_ref().parse::<AnalysisPhase>())
            .collect::<Result<Self>>()?;
        if set.is_empty() {
            return Err(LensError::Config(
                "At least one analysis phase must be enabled".to_string(),
            ));
        }
        Ok(set)
    }
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self::canonical()
    }
}

impl FromIterator<AnalysisPhase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = AnalysisPhase>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

// =============================================================================
// Comprehensive Summary
// =============================================================================

/// Score and findings for one section of the comprehensive pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionAssessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default)]
    pub issues: Vec<Value>,
}

/// Free-form overall assessment produced by the comprehensive phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Keyed by section name (`structure`, `security`, `performance`, `logic`)
    #[serde(default)]
    pub sections: BTreeMap<String, SectionAssessment>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_status: Option<Value>,
}

// =============================================================================
// Phase Result
// =============================================================================

/// Terminal output of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub phase: AnalysisPhase,
    pub issues: Vec<ClassifiedIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ComprehensiveSummary>,
    pub counts: SeverityCounts,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

// =============================================================================
// Analysis Report
// =============================================================================

/// Aggregated result of every requested phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analysis_id: String,
    pub diagram_id: String,
    pub phase_set: PhaseSet,
    pub issues: Vec<ClassifiedIssue>,
    pub counts: SeverityCounts,
    pub phases: Vec<PhaseResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ComprehensiveSummary>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    pub fn critical_issues(&self) -> usize {
        self.counts.critical
    }

    pub fn high_issues(&self) -> usize {
        self.counts.high
    }

    pub fn phase(&self, phase: AnalysisPhase) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Phases that fell back to placeholder output.
    pub fn degraded_phases(&self) -> Vec<AnalysisPhase> {
        self.phases
            .iter()
            .filter(|p| p.degraded)
            .map(|p| p.phase)
            .collect()
    }
}
