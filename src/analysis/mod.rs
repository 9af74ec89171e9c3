//! BPMN analysis pipeline
//!
//! - `decoder`: phase output JSON into raw issues or a summary
//! - `classifier`: label normalization into typed issues
//! - `phase`: one phase from prompt to result, degrading instead of failing
//! - `cache` / `registry`: shared report and run state
//! - `orchestrator`: concurrent phases, join, aggregation

pub mod cache;
pub mod classifier;
pub mod decoder;
pub mod orchestrator;
pub mod phase;
pub mod registry;

pub use cache::{Clock, ManualClock, ReportCache, SystemClock};
pub use classifier::{ClassifiedIssues, IssueClassifier};
pub use decoder::{
    DecodedPhase, RawIssue, decode_comprehensive, decode_issues, decode_phase, fallback_summary,
};
pub use orchestrator::{AnalysisOrchestrator, OrchestratorConfig, OrchestratorStats};
pub use phase::{PhaseRunner, PhaseState, TransitionObserver};
pub use registry::StatusRegistry;
