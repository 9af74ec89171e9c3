pub mod error;
pub mod issue;
pub mod model;
pub mod report;
pub mod run;
pub mod utils;

pub use error::{ErrorCategory, ErrorClassifier, LensError, LlmError, Result};
pub use issue::{ClassifiedIssue, IssueType, Severity, SeverityCounts};
pub use model::ParsedProcessModel;
pub use report::{
    AnalysisPhase, AnalysisReport, ComprehensiveSummary, PhaseResult, PhaseSet, SectionAssessment,
};
pub use run::{AnalysisRun, RunStatus};
pub use utils::{
    ParseWithDefault, json_first_string, json_string, json_string_array,
    normalize_label, preview,
};
