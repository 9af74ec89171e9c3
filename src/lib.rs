//! bpmn-lens - LLM-backed BPMN diagram review
//!
//! Runs a set of analysis phases (structure, security, performance, and a
//! comprehensive summary) over a parsed BPMN process model. Every phase
//! prompts a chain of LLM providers, decodes the answer into issues, and
//! degrades to a placeholder instead of failing the run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use bpmn_lens::ai::TemplatePromptBuilder;
//! use bpmn_lens::{AnalysisOrchestrator, ConfigLoader, ParsedProcessModel, ProviderGateway};
//!
//! # async fn run() -> bpmn_lens::Result<()> {
//! let config = ConfigLoader::load()?;
//! let gateway = ProviderGateway::from_configs(
//!     &config.llm.provider_configs()?,
//!     config.llm.gateway_config(),
//! )?;
//! let orchestrator = AnalysisOrchestrator::new(
//!     Arc::new(gateway),
//!     Arc::new(TemplatePromptBuilder::new()),
//!     config.analysis.orchestrator_config()?,
//! );
//!
//! let model = ParsedProcessModel::from_json_file(Path::new("order-process.json"))?;
//! let report = orchestrator.run_analysis("order-process", model).await?;
//! println!("{} issues", report.total_issues());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider gateway, response extraction, prompt building
//! - [`analysis`]: decoders, classifier, phase runner, orchestrator
//! - [`config`]: layered configuration
//! - [`types`]: domain types and errors

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod constants;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{AnalysisConfig, Config, ConfigLoader, LlmConfig};

pub use types::error::{ErrorCategory, LensError, Result};

pub use types::{
    AnalysisPhase, AnalysisReport, AnalysisRun, ClassifiedIssue, IssueType, ParsedProcessModel,
    PhaseSet, RunStatus, Severity,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use analysis::{
    AnalysisOrchestrator, IssueClassifier, OrchestratorConfig, PhaseRunner, ReportCache,
    StatusRegistry,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    LlmProvider, ProviderConfig, ProviderGateway, ResponseExtractor, SharedProvider, with_timeout,
};
