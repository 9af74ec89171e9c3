//! Parsed process model input.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{LensError, Result};
use super::utils::json_first_string;

/// A diagram already parsed by an external BPMN/OpenAPI parser.
///
/// The content tree is opaque to the orchestrator; only prompt builders look
/// inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedProcessModel {
    pub diagram_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: Value,
}

impl ParsedProcessModel {
    pub fn new(diagram_id: impl Into<String>, content: Value) -> Self {
        Self {
            diagram_id: diagram_id.into(),
            name: None,
            content,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Wrap a parser's JSON output. `diagramId` or `id` at the root wins over
    /// `fallback_id`.
    pub fn from_value(fallback_id: &str, content: Value) -> Self {
        let diagram_id = json_first_string(&content, &["diagramId", "id"])
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| fallback_id.to_string());
        let name = json_first_string(&content, &["name", "processName"]);
        Self {
            diagram_id,
            name,
            content,
        }
    }

    /// Load a parsed model from a JSON file, using the file stem as the
    /// fallback diagram id.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let content: Value = serde_json::from_str(&raw)?;
        if !content.is_object() {
            return Err(LensError::Config(format!(
                "Process model {} must be a JSON object",
                path.display()
            )));
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("diagram");
        Ok(Self::from_value(stem, content))
    }

    /// Number of entries under `elements`, when the parser produced one.
    pub fn element_count(&self) -> Option<usize> {
        self.content
            .get("elements")
            .and_then(Value::as_array)
            .map(Vec::len)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.diagram_id)
    }
}
