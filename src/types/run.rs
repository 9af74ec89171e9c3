//! Analysis run lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one analysis run.
///
/// Coarse order: `Started` → phase labels → `Aggregating` → terminal.
/// Phase labels are the most recently started phase and carry no ordering
/// among themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Started,
    StructureAnalysis,
    SecurityAnalysis,
    PerformanceAnalysis,
    ComprehensiveAnalysis,
    LogicAnalysis,
    ValidationAnalysis,
    Aggregating,
    Completed,
    Failed(String),
}

impl RunStatus {
    fn stage(&self) -> u8 {
        match self {
            Self::Started => 0,
            Self::StructureAnalysis
            | Self::SecurityAnalysis
            | Self::PerformanceAnalysis
            | Self::ComprehensiveAnalysis
            | Self::LogicAnalysis
            | Self::ValidationAnalysis => 1,
            Self::Aggregating => 2,
            Self::Completed | Self::Failed(_) => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    pub fn is_phase_label(&self) -> bool {
        self.stage() == 1
    }

    /// Whether moving to `next` keeps the coarse order intact.
    pub fn can_transition_to(&self, next: &RunStatus) -> bool {
        !self.is_terminal() && next.stage() >= self.stage()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::StructureAnalysis => "STRUCTURE_ANALYSIS",
            Self::SecurityAnalysis => "SECURITY_ANALYSIS",
            Self::PerformanceAnalysis => "PERFORMANCE_ANALYSIS",
            Self::ComprehensiveAnalysis => "COMPREHENSIVE_ANALYSIS",
            Self::LogicAnalysis => "LOGIC_ANALYSIS",
            Self::ValidationAnalysis => "VALIDATION_ANALYSIS",
            Self::Aggregating => "AGGREGATING",
            Self::Completed => "COMPLETED",
            Self::Failed(_) => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "FAILED({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// One invocation of the orchestrator for a diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub analysis_id: String,
    pub diagram_id: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisRun {
    pub fn start(diagram_id: impl Into<String>) -> Self {
        let diagram_id = diagram_id.into();
        let created_at = Utc::now();
        Self {
            analysis_id: Self::new_id(&diagram_id, created_at),
            diagram_id,
            status: RunStatus::Started,
            created_at,
            completed_at: None,
        }
    }

    /// Diagram id, millisecond timestamp, and a random suffix so two runs
    /// started in the same millisecond never share an id.
    fn new_id(diagram_id: &str, at: DateTime<Utc>) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "bpmn_analysis_{}_{}_{}",
            diagram_id,
            at.timestamp_millis(),
            &suffix[..8]
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Copy of this run in `next` state, or `None` when the move would
    /// violate the coarse order.
    pub fn transitioned(&self, next: RunStatus) -> Option<Self> {
        if !self.status.can_transition_to(&next) {
            return None;
        }
        let mut run = self.clone();
        if next.is_terminal() {
            run.completed_at = Some(Utc::now());
        }
        run.status = next;
        Some(run)
    }
}
