//! Shared utility functions for reading loosely-shaped model output.
//!
//! ## JSON Extraction Helpers
//!
//! Provides ergonomic helpers for extracting values from `serde_json::Value`:
//! - `json_string` - Extract strings, coercing scalars
//! - `json_string_array` - Extract string arrays
//! - `json_first_string` - First present key among synonyms

use serde_json::Value;

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract string from JSON value by key.
///
/// Numbers and booleans are rendered to text, since models routinely emit
/// `"score": 7` where a string is expected.
#[inline]
pub fn json_string(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First string found among several candidate keys.
pub fn json_first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| json_string(value, key))
}

/// Extract string array from JSON value by key.
#[inline]
pub fn json_string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// String Utilities
// =============================================================================

/// Uppercase a label and collapse whitespace runs to a single underscore.
///
/// `"very  high"` becomes `"VERY_HIGH"`.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Truncate to a character count, appending an ellipsis when shortened.
pub fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

// =============================================================================
// Type Parsing
// =============================================================================

/// Trait for parsing strings into enum types with a default fallback.
/// Used for normalizing model-supplied labels, where invalid strings must
/// fall back gracefully. Logs at debug level when the fallback is taken.
pub trait ParseWithDefault: Sized {
    /// The name of this type for logging purposes.
    fn type_name() -> &'static str;

    /// The default value to use when parsing fails.
    fn default_value() -> Self;

    /// Try to parse an already-normalized label, returning None if unknown.
    fn try_parse(s: &str) -> Option<Self>;

    /// Normalize and parse an optional label, falling back to the default.
    fn parse_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default_value();
        };
        let normalized = normalize_label(raw);
        match Self::try_parse(&normalized) {
            Some(v) => v,
            None => {
                tracing::debug!(
                    "Unrecognized {} value '{}', using default",
                    Self::type_name(),
                    raw
                );
                Self::default_value()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_string_coerces_scalars() {
        let v = json!({"a": "x", "b": 7, "c": true, "d": null, "e": [1]});
        assert_eq!(json_string(&v, "a").as_deref(), Some("x"));
        assert_eq!(json_string(&v, "b").as_deref(), Some("7"));
        assert_eq!(json_string(&v, "c").as_deref(), Some("true"));
        assert_eq!(json_string(&v, "d"), None);
        assert_eq!(json_string(&v, "e"), None);
        assert_eq!(json_string(&v, "missing"), None);
    }

    #[test]
    fn test_json_first_string() {
        let v = json!({"elementId": "Task_1"});
        assert_eq!(
            json_first_string(&v, &["element", "elementId"]).as_deref(),
            Some("Task_1")
        );
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("very high"), "VERY_HIGH");
        assert_eq!(normalize_label("  logic \t error "), "LOGIC_ERROR");
        assert_eq!(normalize_label(""), "");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
