//! Prompt construction for analysis phases.
//!
//! The orchestrator only depends on [`PromptBuilder`]; the bundled
//! [`TemplatePromptBuilder`] is what the CLI wires in.

mod composer;
mod templates;

pub use composer::{PromptComposer, PromptSection};
pub use templates::TemplatePromptBuilder;

use crate::types::{AnalysisPhase, ParsedProcessModel};

/// Builds the prompt text for one phase over one diagram.
pub trait PromptBuilder: Send + Sync {
    fn build_prompt(&self, phase: AnalysisPhase, model: &ParsedProcessModel) -> String;
}
