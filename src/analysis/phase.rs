//! Phase runner
//!
//! One phase of analysis as a single task:
//!
//! ```text
//! Pending -> Prompting -> AwaitingModel -> Decoding -> Classified
//!                              |               |
//!                              +---> Degraded <+
//! ```
//!
//! A phase never fails. Provider exhaustion, timeouts, unextractable output,
//! and decode errors all end in `Degraded` with a placeholder result.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::classifier::IssueClassifier;
use super::decoder::{DecodedPhase, decode_phase, fallback_summary};
use crate::ai::{Extraction, PromptBuilder, ProviderGateway, ResponseExtractor, with_timeout};
use crate::constants::analysis as analysis_constants;
use crate::types::{
    AnalysisPhase, ClassifiedIssue, ComprehensiveSummary, ParsedProcessModel, PhaseResult,
    SeverityCounts, preview,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Pending,
    Prompting,
    AwaitingModel,
    Decoding,
    Classified,
    Degraded,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Classified | Self::Degraded)
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Prompting => "PROMPTING",
            Self::AwaitingModel => "AWAITING_MODEL",
            Self::Decoding => "DECODING",
            Self::Classified => "CLASSIFIED",
            Self::Degraded => "DEGRADED",
        };
        f.write_str(label)
    }
}

/// Called on every state change of a phase.
pub type TransitionObserver = Arc<dyn Fn(AnalysisPhase, PhaseState) + Send + Sync>;

/// Runs phases against a shared gateway. Cheap to clone.
#[derive(Clone)]
pub struct PhaseRunner {
    gateway: Arc<ProviderGateway>,
    prompts: Arc<dyn PromptBuilder>,
    extractor: ResponseExtractor,
    phase_deadline: Duration,
    observer: Option<TransitionObserver>,
}

impl PhaseRunner {
    /// Phase deadline defaults to the gateway's worst-case call, so a hung
    /// provider cannot starve the ones after it.
    pub fn new(gateway: Arc<ProviderGateway>, prompts: Arc<dyn PromptBuilder>) -> Self {
        let phase_deadline = gateway.worst_case_call();

        Self {
            gateway,
            prompts,
            extractor: ResponseExtractor::new(),
            phase_deadline,
            observer: None,
        }
    }

    pub fn with_phase_deadline(mut self, deadline: Duration) -> Self {
        self.phase_deadline = deadline;
        self
    }

    pub fn with_observer(mut self, observer: TransitionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn phase_deadline(&self) -> Duration {
        self.phase_deadline
    }

    #[instrument(skip(self, model), fields(diagram_id = %model.diagram_id, phase = %phase))]
    pub async fn run(&self, phase: AnalysisPhase, model: &ParsedProcessModel) -> PhaseResult {
        let started = Instant::now();
        self.notify(phase, PhaseState::Pending);

        self.notify(phase, PhaseState::Prompting);
        let prompt = self.prompts.build_prompt(phase, model);

        self.notify(phase, PhaseState::AwaitingModel);
        let raw = match with_timeout(
            self.phase_deadline,
            self.gateway.complete(&prompt, phase.as_str()),
            &format!("{} phase", phase),
        )
        .await
        {
            Ok(raw) => raw,
            Err(err) => return self.degrade(phase, err.to_string(), started),
        };

        self.notify(phase, PhaseState::Decoding);
        let value = match self.extractor.extract(&raw) {
            Extraction::Parsed { value, repaired } => {
                if repaired {
                    debug!("Model output needed JSON repair");
                }
                value
            }
            Extraction::Unparsable { reason } => {
                warn!(
                    raw = %preview(&raw, analysis_constants::RAW_PREVIEW_CHARS),
                    "Unparsable model output"
                );
                return self.degrade(phase, format!("extraction failed: {}", reason), started);
            }
        };

        let result = match decode_phase(phase, &value) {
            Ok(DecodedPhase::Issues(raw_issues)) => {
                let classified = IssueClassifier::classify(&raw_issues);
                let counts = classified.counts();
                self.finish(phase, classified.into_vec(), None, counts, started)
            }
            Ok(DecodedPhase::Summary(summary)) => {
                self.finish(phase, Vec::new(), Some(summary), SeverityCounts::default(), started)
            }
            Err(err) => return self.degrade(phase, err.to_string(), started),
        };

        self.notify(phase, PhaseState::Classified);
        info!(
            issues = result.issues.len(),
            elapsed_ms = result.processing_time_ms,
            "Phase classified"
        );
        result
    }

    fn finish(
        &self,
        phase: AnalysisPhase,
        issues: Vec<ClassifiedIssue>,
        summary: Option<ComprehensiveSummary>,
        counts: SeverityCounts,
        started: Instant,
    ) -> PhaseResult {
        PhaseResult {
            phase,
            issues,
            summary,
            counts,
            processing_time_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            degraded: false,
            degraded_reason: None,
        }
    }

    fn degrade(&self, phase: AnalysisPhase, reason: String, started: Instant) -> PhaseResult {
        warn!(%reason, "Phase degraded");
        self.notify(phase, PhaseState::Degraded);

        let (issues, summary) = if phase.is_comprehensive() {
            (Vec::new(), Some(fallback_summary()))
        } else {
            (vec![placeholder_issue(phase, &reason)], None)
        };
        let counts = SeverityCounts::from_issues(&issues);

        PhaseResult {
            phase,
            issues,
            summary,
            counts,
            processing_time_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            degraded: true,
            degraded_reason: Some(reason),
        }
    }

    fn notify(&self, phase: AnalysisPhase, state: PhaseState) {
        debug!(%state, "Phase transition");
        if let Some(observer) = &self.observer {
            observer(phase, state);
        }
    }
}

/// Stand-in issue recording that a phase produced nothing usable.
fn placeholder_issue(phase: AnalysisPhase, reason: &str) -> ClassifiedIssue {
    let mut metadata = Map::new();
    metadata.insert("placeholder".to_string(), Value::Bool(true));

    ClassifiedIssue {
        id: format!("issue_{}", uuid::Uuid::new_v4().simple()),
        issue_type: phase.issue_type(),
        severity: phase.degraded_severity(),
        title: format!(
            "{} analysis failed to produce a parseable result",
            phase.as_str().to_lowercase()
        ),
        description: Some(reason.to_string()),
        recommendation: Some("Re-run the analysis or review this area manually".to_string()),
        element_id: None,
        element_name: None,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{GatewayConfig, LlmProvider, SharedProvider, TemplatePromptBuilder};
    use crate::types::{LensError, Result, Severity};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedProvider {
        reply: Option<&'static str>,
        delay: Duration,
    }

    #[async_trait]
    impl LlmProvider for FixedProvider {
        async fn complete(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            self.reply
                .map(String::from)
                .ok_or_else(|| LensError::LlmApi("401 unauthorized".to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn runner(reply: Option<&'static str>, delay: Duration) -> PhaseRunner {
        let provider: SharedProvider = Arc::new(FixedProvider { reply, delay });
        let gateway = ProviderGateway::new(vec![provider], GatewayConfig::default());
        PhaseRunner::new(Arc::new(gateway), Arc::new(TemplatePromptBuilder::new()))
    }

    fn model() -> ParsedProcessModel {
        ParsedProcessModel::new("d1", serde_json::json!({"elements": []}))
    }

    #[tokio::test]
    async fn test_classified_phase() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = runner(
            Some(r#"```json
{"structureIssues": [
  {"type": "Missing end", "severity": "HIGH"},
  {"type": "Orphan task", "severity": "low"}
]}
```"#),
            Duration::ZERO,
        )
        .with_observer(Arc::new(move |_: AnalysisPhase, state: PhaseState| {
            if let Ok(mut states) = sink.lock() {
                states.push(state);
            }
        }));

        let result = runner.run(AnalysisPhase::Structure, &model()).await;
        assert!(!result.degraded);
        assert_eq!(result.issues.len(), 2);
        assert_eq!(result.counts.high, 1);
        assert_eq!(result.counts.low, 1);

        let states = seen.lock().unwrap().clone();
        assert_eq!(
            states,
            vec![
                PhaseState::Pending,
                PhaseState::Prompting,
                PhaseState::AwaitingModel,
                PhaseState::Decoding,
                PhaseState::Classified,
            ]
        );
    }

    #[tokio::test]
    async fn test_prose_wrapped_empty_list_is_clean() {
        let reply = "I reviewed the diagram.\n{\"structureIssues\": []}\nNo problems found.";
        let result = runner(Some(reply), Duration::ZERO)
            .run(AnalysisPhase::Structure, &model())
            .await;
        assert!(!result.degraded);
        assert!(result.issues.is_empty());
        assert_eq!(result.counts.total(), 0);
    }

    #[tokio::test]
    async fn test_unparsable_output_degrades() {
        let result = runner(Some("I cannot help with that."), Duration::ZERO)
            .run(AnalysisPhase::Structure, &model())
            .await;
        assert!(result.degraded);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Medium);
        assert!(result.degraded_reason.unwrap().starts_with("extraction failed"));
    }

    #[tokio::test]
    async fn test_security_placeholder_is_high() {
        let result = runner(Some("no json"), Duration::ZERO)
            .run(AnalysisPhase::Security, &model())
            .await;
        assert_eq!(result.issues[0].severity, Severity::High);
        assert_eq!(result.counts.high, 1);
    }

    #[tokio::test]
    async fn test_decode_error_degrades() {
        let result = runner(Some(r#"{"somethingElse": []}"#), Duration::ZERO)
            .run(AnalysisPhase::Performance, &model())
            .await;
        assert!(result.degraded);
        assert!(result.degraded_reason.unwrap().contains("performanceIssues"));
    }

    #[tokio::test]
    async fn test_provider_exhaustion_degrades() {
        let result = runner(None, Duration::ZERO)
            .run(AnalysisPhase::Logic, &model())
            .await;
        assert!(result.degraded);
        assert_eq!(result.issues[0].severity, Severity::High);
        assert!(result.degraded_reason.unwrap().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_comprehensive_summary() {
        let result = runner(Some(r#"{"overallScore": "8", "grade": "B"}"#), Duration::ZERO)
            .run(AnalysisPhase::Comprehensive, &model())
            .await;
        assert!(!result.degraded);
        assert!(result.issues.is_empty());
        assert_eq!(result.summary.unwrap().grade.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_comprehensive_degraded_uses_fallback() {
        let result = runner(Some("garbage"), Duration::ZERO)
            .run(AnalysisPhase::Comprehensive, &model())
            .await;
        assert!(result.degraded);
        assert!(result.issues.is_empty());
        assert_eq!(result.summary.unwrap().grade.as_deref(), Some("C"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_deadline_degrades() {
        let result = runner(Some(r#"{"structureIssues": []}"#), Duration::from_secs(600))
            .with_phase_deadline(Duration::from_secs(1))
            .run(AnalysisPhase::Structure, &model())
            .await;
        assert!(result.degraded);
        assert!(result.degraded_reason.unwrap().contains("Timeout"));
    }

    #[test]
    fn test_default_deadline_scales_with_providers() {
        let providers: Vec<SharedProvider> = vec![
            Arc::new(FixedProvider { reply: None, delay: Duration::ZERO }),
            Arc::new(FixedProvider { reply: None, delay: Duration::ZERO }),
        ];
        let config = GatewayConfig {
            per_attempt_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        let gateway = ProviderGateway::new(providers, config);
        let runner = PhaseRunner::new(Arc::new(gateway), Arc::new(TemplatePromptBuilder::new()));
        assert_eq!(runner.phase_deadline(), Duration::from_secs(20));
    }

    #[test]
    fn test_default_deadline_covers_retries() {
        let providers: Vec<SharedProvider> = vec![
            Arc::new(FixedProvider { reply: None, delay: Duration::ZERO }),
            Arc::new(FixedProvider { reply: None, delay: Duration::ZERO }),
        ];
        let config = GatewayConfig {
            per_attempt_timeout: Duration::from_secs(10),
            attempts_per_provider: 2,
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        let gateway = ProviderGateway::new(providers, config);
        let runner = PhaseRunner::new(Arc::new(gateway), Arc::new(TemplatePromptBuilder::new()));
        // (2 x 10s + 1s backoff) per provider
        assert_eq!(runner.phase_deadline(), Duration::from_secs(42));
    }
}
