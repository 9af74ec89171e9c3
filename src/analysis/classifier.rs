//! Issue classification
//!
//! Normalizes the free-form labels in [`RawIssue`]s into [`IssueType`] and
//! [`Severity`]. Classification is total: every input yields a classified
//! issue, unknown labels fall back to the defaults.

use std::collections::BTreeMap;

use super::decoder::RawIssue;
use crate::types::{ClassifiedIssue, IssueType, Severity, SeverityCounts};

/// Classified issues with counts derived from the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedIssues {
    issues: Vec<ClassifiedIssue>,
}

impl ClassifiedIssues {
    pub fn issues(&self) -> &[ClassifiedIssue] {
        &self.issues
    }

    pub fn into_vec(self) -> Vec<ClassifiedIssue> {
        self.issues
    }

    pub fn total(&self) -> usize {
        self.issues.len()
    }

    pub fn counts(&self) -> SeverityCounts {
        SeverityCounts::from_issues(&self.issues)
    }

    /// Swap in a new list; counts follow automatically.
    pub fn replace(&mut self, issues: Vec<ClassifiedIssue>) {
        self.issues = issues;
    }

    pub fn group_by_type(&self) -> BTreeMap<IssueType, Vec<&ClassifiedIssue>> {
        let mut groups: BTreeMap<IssueType, Vec<&ClassifiedIssue>> = BTreeMap::new();
        for issue in &self.issues {
            groups.entry(issue.issue_type).or_default().push(issue);
        }
        groups
    }

    /// Stable ordering, CRITICAL first.
    pub fn sort_by_severity(&self) -> Vec<&ClassifiedIssue> {
        let mut sorted: Vec<&ClassifiedIssue> = self.issues.iter().collect();
        sorted.sort_by_key(|issue| issue.severity);
        sorted
    }
}

impl From<Vec<ClassifiedIssue>> for ClassifiedIssues {
    fn from(issues: Vec<ClassifiedIssue>) -> Self {
        Self { issues }
    }
}

/// Stateless label normalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueClassifier;

impl IssueClassifier {
    pub fn classify(raw: &[RawIssue]) -> ClassifiedIssues {
        ClassifiedIssues {
            issues: raw.iter().map(Self::classify_one).collect(),
        }
    }

    pub fn classify_one(raw: &RawIssue) -> ClassifiedIssue {
        let issue_type = IssueType::normalize(raw.issue_type.as_deref());
        let severity = Severity::normalize(raw.severity.as_deref());

        let title = raw
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .or_else(|| {
                raw.description
                    .as_deref()
                    .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
                    .map(String::from)
            })
            .unwrap_or_else(|| issue_type.as_str().to_string());

        ClassifiedIssue {
            id: raw
                .id
                .clone()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(new_issue_id),
            issue_type,
            severity,
            title,
            description: raw.description.clone(),
            recommendation: raw.recommendation.clone(),
            element_id: raw.element_id.clone(),
            element_name: raw.element_name.clone(),
            metadata: raw.metadata.clone(),
        }
    }
}

fn new_issue_id() -> String {
    format!("issue_{}", uuid::Uuid::new_v4().simple())
}
