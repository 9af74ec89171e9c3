//! Phase decoders
//!
//! Turn the extracted JSON of one phase into raw issues or a comprehensive
//! summary. Fields are read independently; anything missing stays `None`.
//! Only a wrong overall shape is an error.

use serde_json::{Map, Value};

use crate::types::{
    AnalysisPhase, ComprehensiveSummary, LensError, Result, SectionAssessment, json_first_string,
    json_string, json_string_array,
};

/// Sections read from `analysis.*` in comprehensive output
const SECTIONS: [&str; 4] = ["structure", "security", "performance", "logic"];

/// An issue as the model reported it, before label normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawIssue {
    pub id: Option<String>,
    pub issue_type: Option<String>,
    pub severity: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub recommendation: Option<String>,
    pub element_id: Option<String>,
    pub element_name: Option<String>,
    pub metadata: Map<String, Value>,
}

impl RawIssue {
    pub fn new(issue_type: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            issue_type: Some(issue_type.into()),
            severity: Some(severity.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// What a phase decoded to.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPhase {
    Issues(Vec<RawIssue>),
    Summary(ComprehensiveSummary),
}

/// Decode the extracted output of `phase`.
pub fn decode_phase(phase: AnalysisPhase, value: &Value) -> Result<DecodedPhase> {
    match phase.issue_key() {
        Some(_) => decode_issues(phase, value).map(DecodedPhase::Issues),
        None => decode_comprehensive(value).map(DecodedPhase::Summary),
    }
}

/// Read the phase's issue array.
///
/// A bare array wrapped by the extractor under `items` is accepted too.
pub fn decode_issues(phase: AnalysisPhase, value: &Value) -> Result<Vec<RawIssue>> {
    let key = phase.issue_key().ok_or_else(|| {
        LensError::decode(phase.as_str(), "phase has no issue list")
    })?;

    let items = match value.get(key).or_else(|| value.get("items")) {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(LensError::decode(
                phase.as_str(),
                format!("'{}' is not an array", key),
            ));
        }
        None => {
            return Err(LensError::decode(
                phase.as_str(),
                format!("missing '{}'", key),
            ));
        }
    };

    Ok(items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| decode_item(phase, item))
        .collect())
}

fn decode_item(phase: AnalysisPhase, item: &Value) -> RawIssue {
    let recommendation_keys: &[&str] = match phase {
        AnalysisPhase::Validation => &["fix", "recommendation"],
        _ => &["recommendation"],
    };

    let mut metadata = Map::new();
    match phase {
        AnalysisPhase::Security => {
            if let Some(cwe) = json_string(item, "cweId") {
                metadata.insert("cweId".to_string(), Value::String(cwe));
            }
        }
        AnalysisPhase::Performance => {
            if let Some(impact) = json_string(item, "estimatedImpact") {
                metadata.insert("impact".to_string(), Value::String(impact));
            }
        }
        _ => {}
    }

    RawIssue {
        id: json_string(item, "id"),
        issue_type: Some(
            json_string(item, "category").unwrap_or_else(|| phase.issue_type().as_str().to_string()),
        ),
        severity: json_string(item, "severity"),
        title: json_first_string(item, &["type", "title"]),
        description: json_string(item, "description"),
        recommendation: json_first_string(item, recommendation_keys),
        element_id: json_first_string(item, &["element", "elementId"]),
        element_name: json_string(item, "elementName"),
        metadata,
    }
}

/// Read the comprehensive summary shape.
pub fn decode_comprehensive(value: &Value) -> Result<ComprehensiveSummary> {
    if !value.is_object() {
        return Err(LensError::decode(
            AnalysisPhase::Comprehensive.as_str(),
            "root is not an object",
        ));
    }

    let mut sections = std::collections::BTreeMap::new();
    if let Some(analysis) = value.get("analysis").filter(|a| a.is_object()) {
        for name in SECTIONS {
            if let Some(section) = analysis.get(name).filter(|s| s.is_object()) {
                sections.insert(
                    name.to_string(),
                    SectionAssessment {
                        score: json_string(section, "score"),
                        issues: section
                            .get("issues")
                            .and_then(Value::as_array)
                            .cloned()
                            .unwrap_or_default(),
                    },
                );
            }
        }
    }

    Ok(ComprehensiveSummary {
        overall_score: json_string(value, "overallScore"),
        grade: json_string(value, "grade"),
        summary: json_string(value, "summary"),
        sections,
        recommendations: json_string_array(value, "recommendations"),
        compliance_status: value.get("complianceStatus").cloned(),
    })
}

/// Summary used when the comprehensive phase degrades.
pub fn fallback_summary() -> ComprehensiveSummary {
    let sections = [
        ("structure", "Structure could not be analyzed"),
        ("security", "Security could not be analyzed"),
        ("performance", "Performance could not be analyzed"),
    ]
    .into_iter()
    .map(|(name, note)| {
        (
            name.to_string(),
            SectionAssessment {
                score: Some("5".to_string()),
                issues: vec![Value::String(note.to_string())],
            },
        )
    })
    .collect();

    ComprehensiveSummary {
        overall_score: Some("5".to_string()),
        grade: Some("C".to_string()),
        summary: Some("Analysis failed: the model returned an unusable response".to_string()),
        sections,
        recommendations: vec![
            "Check the BPMN diagram for correctness".to_string(),
            "Repeat the analysis".to_string(),
        ],
        compliance_status: None,
    }
}
