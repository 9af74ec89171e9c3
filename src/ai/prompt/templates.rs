//! Default phase prompt templates.

use super::{PromptBuilder, PromptComposer};
use crate::types::{AnalysisPhase, ParsedProcessModel};

/// Phase prompts that spell out the JSON contract each decoder reads.
#[derive(Debug, Clone)]
pub struct TemplatePromptBuilder {
    /// Longest serialized diagram embedded in a prompt
    max_model_chars: usize,
}

impl Default for TemplatePromptBuilder {
    fn default() -> Self {
        Self {
            max_model_chars: 60_000,
        }
    }
}

impl TemplatePromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_model_chars(mut self, max: usize) -> Self {
        self.max_model_chars = max;
        self
    }

    fn render_model(&self, model: &ParsedProcessModel) -> String {
        let rendered = serde_json::to_string_pretty(&model.content)
            .unwrap_or_else(|_| model.content.to_string());
        if rendered.chars().count() <= self.max_model_chars {
            rendered
        } else {
            let mut cut: String = rendered.chars().take(self.max_model_chars).collect();
            cut.push_str("\n... (truncated)");
            cut
        }
    }

    fn objectives(phase: AnalysisPhase) -> &'static [&'static str] {
        match phase {
            AnalysisPhase::Structure => &[
                "Find missing start or end events and unreachable elements",
                "Find gateways whose outgoing flows have no conditions or defaults",
                "Find dangling sequence flows and disconnected sub-processes",
            ],
            AnalysisPhase::Security => &[
                "Find service calls and data exchanges without authentication",
                "Find sensitive data passed through unprotected tasks or message flows",
                "Reference a CWE identifier when one applies",
            ],
            AnalysisPhase::Performance => &[
                "Find sequential tasks that could run in parallel",
                "Find loops, retries, and waits that can stall the process",
                "Estimate the impact of each finding",
            ],
            AnalysisPhase::Logic => &[
                "Find contradictory gateway conditions and dead paths",
                "Find deadlocks between parallel and exclusive gateways",
            ],
            AnalysisPhase::Validation => &[
                "Find elements that violate BPMN 2.0 rules",
                "Give a concrete fix for each violation",
            ],
            AnalysisPhase::Comprehensive => &[
                "Score the process from 1 to 10 overall and per section",
                "Assign a letter grade and summarize the main risks",
                "List the most valuable recommendations",
            ],
        }
    }

    fn output_contract(phase: AnalysisPhase) -> String {
        match phase.issue_key() {
            Some(key) => {
                let extra = match phase {
                    AnalysisPhase::Security => r#", "cweId": "CWE-306""#,
                    AnalysisPhase::Performance => r#", "estimatedImpact": "high latency""#,
                    _ => "",
                };
                let advice = if phase == AnalysisPhase::Validation {
                    "fix"
                } else {
                    "recommendation"
                };
                format!(
                    r#"{{"{key}": [{{"type": "shortIssueName", "severity": "CRITICAL|HIGH|MEDIUM|LOW", "element": "elementId", "description": "what is wrong", "{advice}": "how to fix"{extra}}}]}}"#
                )
            }
            None => r#"{"overallScore": "7", "grade": "B", "summary": "...", "analysis": {"structure": {"score": "7", "issues": ["..."]}, "security": {"score": "6", "issues": []}, "performance": {"score": "8", "issues": []}, "logic": {"score": "7", "issues": []}}, "recommendations": ["..."], "complianceStatus": {"bpmn20": true}}"#
                .to_string(),
        }
    }
}

impl PromptBuilder for TemplatePromptBuilder {
    fn build_prompt(&self, phase: AnalysisPhase, model: &ParsedProcessModel) -> String {
        let focus = format!("{} analysis of this diagram", phase.as_str().to_lowercase());
        let mut composer = PromptComposer::new()
            .role("business process analyst", &focus)
            .objectives(Self::objectives(phase))
            .context_item("Diagram", &model.diagram_id)
            .context_item("Name", model.display_name());

        if let Some(count) = model.element_count() {
            composer = composer.context_item("Elements", &count.to_string());
        }

        composer
            .focus(
                &focus,
                &[
                    "Only report findings grounded in the diagram below",
                    "Use element ids exactly as they appear in the diagram",
                ],
            )
            .section("Diagram", "")
            .code("json", &self.render_model(model))
            .section(
                "Output",
                "Respond ONLY with JSON in exactly this shape, no explanation:",
            )
            .code("json", &Self::output_contract(phase))
            .build()
    }
}
