//! Issue types shared by the classifier, phase results, and reports.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::utils::ParseWithDefault;

// =============================================================================
// Issue Type
// =============================================================================

/// Canonical issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    Structure,
    Security,
    Performance,
    LogicError,
    Validation,
    Compliance,
}

impl IssueType {
    pub const ALL: [IssueType; 6] = [
        IssueType::Structure,
        IssueType::Security,
        IssueType::Performance,
        IssueType::LogicError,
        IssueType::Validation,
        IssueType::Compliance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "STRUCTURE",
            Self::Security => "SECURITY",
            Self::Performance => "PERFORMANCE",
            Self::LogicError => "LOGIC_ERROR",
            Self::Validation => "VALIDATION",
            Self::Compliance => "COMPLIANCE",
        }
    }

    /// Normalize a free-form label. Unknown or absent labels map to `Structure`.
    pub fn normalize(raw: Option<&str>) -> Self {
        Self::parse_or_default(raw)
    }
}

impl ParseWithDefault for IssueType {
    fn type_name() -> &'static str {
        "IssueType"
    }

    fn default_value() -> Self {
        IssueType::Structure
    }

    fn try_parse(s: &str) -> Option<Self> {
        match s {
            "STRUCTURE" | "STRUCTURAL" => Some(Self::Structure),
            "SECURITY" => Some(Self::Security),
            "PERFORMANCE" => Some(Self::Performance),
            "LOGIC" | "LOGIC_ERROR" | "LOGICAL" => Some(Self::LogicError),
            "VALIDATION" | "VALIDATION_ERROR" => Some(Self::Validation),
            "COMPLIANCE" | "COMPLIANCE_ERROR" => Some(Self::Compliance),
            _ => None,
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Issue severity, declared most severe first so ascending order sorts
/// CRITICAL to the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Normalize a free-form label. Unknown or absent labels map to `Medium`.
    pub fn normalize(raw: Option<&str>) -> Self {
        Self::parse_or_default(raw)
    }
}

impl ParseWithDefault for Severity {
    fn type_name() -> &'static str {
        "Severity"
    }

    fn default_value() -> Self {
        Severity::Medium
    }

    fn try_parse(s: &str) -> Option<Self> {
        match s {
            "CRITICAL" | "VERY_HIGH" => Some(Self::Critical),
            "HIGH" => Some(Self::High),
            "MEDIUM" | "MODERATE" => Some(Self::Medium),
            "LOW" | "MINOR" | "INFO" | "INFORMATION" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Classified Issue
// =============================================================================

/// An issue with canonical type and severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedIssue {
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

// =============================================================================
// Severity Counts
// =============================================================================

/// Per-severity histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a ClassifiedIssue>) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            counts.add(issue.severity);
        }
        counts
    }

    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_type_synonyms() {
        assert_eq!(IssueType::normalize(Some("structural")), IssueType::Structure);
        assert_eq!(IssueType::normalize(Some("Logical")), IssueType::LogicError);
        assert_eq!(IssueType::normalize(Some("logic error")), IssueType::LogicError);
        assert_eq!(
            IssueType::normalize(Some("validation_error")),
            IssueType::Validation
        );
        assert_eq!(
            IssueType::normalize(Some("Compliance Error")),
            IssueType::Compliance
        );
    }

    #[test]
    fn test_issue_type_defaults() {
        assert_eq!(IssueType::normalize(None), IssueType::Structure);
        assert_eq!(IssueType::normalize(Some("")), IssueType::Structure);
        assert_eq!(IssueType::normalize(Some("usability")), IssueType::Structure);
    }

    #[test]
    fn test_severity_synonyms() {
        assert_eq!(Severity::normalize(Some("very_high")), Severity::Critical);
        assert_eq!(Severity::normalize(Some("very high")), Severity::Critical);
        assert_eq!(Severity::normalize(Some("moderate")), Severity::Medium);
        assert_eq!(Severity::normalize(Some("Info")), Severity::Low);
        assert_eq!(Severity::normalize(Some("INFORMATION")), Severity::Low);
        assert_eq!(Severity::normalize(Some("minor")), Severity::Low);
    }

    #[test]
    fn test_severity_defaults() {
        assert_eq!(Severity::normalize(None), Severity::Medium);
        assert_eq!(Severity::normalize(Some("urgent")), Severity::Medium);
    }

    #[test]
    fn test_canonical_labels_round_trip() {
        for t in IssueType::ALL {
            assert_eq!(IssueType::normalize(Some(t.as_str())), t);
        }
        for s in Severity::ALL {
            assert_eq!(Severity::normalize(Some(s.as_str())), s);
        }
    }

    #[test]
    fn test_severity_order() {
        let mut v = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        v.sort();
        assert_eq!(v, Severity::ALL.to_vec());
    }

    #[test]
    fn test_serde_labels() {
        assert_eq!(
            serde_json::to_string(&IssueType::LogicError).unwrap(),
            "\"LOGIC_ERROR\""
        );
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
    }

    #[test]
    fn test_severity_counts() {
        let mut counts = SeverityCounts::default();
        counts.add(Severity::High);
        counts.add(Severity::High);
        counts.add(Severity::Low);
        assert_eq!(counts.get(Severity::High), 2);
        assert_eq!(counts.total(), 3);
    }
}
