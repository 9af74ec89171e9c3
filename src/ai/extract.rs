//! Response Extractor
//!
//! Pulls a JSON object out of free-form model output.
//!
//! Handles the usual shapes of LLM output:
//! - Markdown code fence wrapping (```json ... ```)
//! - JSON embedded in explanatory prose
//! - A bare top-level array (wrapped as `{"items": [...]}`)
//! - Trailing commas and missing closers from truncated output
//!
//! Extraction never fails with an error: unusable input yields
//! [`Extraction::Unparsable`] so the caller can degrade instead of abort.

use serde_json::{Value, json};
use tracing::debug;

use crate::types::{LensError, Result};

// =============================================================================
// Extraction Result
// =============================================================================

/// Outcome of pulling JSON out of a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// An object was found. `repaired` is set when trailing commas or
    /// missing closers had to be fixed first.
    Parsed { value: Value, repaired: bool },
    /// Nothing decodable was found.
    Unparsable { reason: String },
}

impl Extraction {
    fn parsed(value: Value, repaired: bool) -> Self {
        Self::Parsed { value, repaired }
    }

    fn unparsable(reason: impl Into<String>) -> Self {
        Self::Unparsable {
            reason: reason.into(),
        }
    }

    pub fn ok(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }

    pub fn was_repaired(&self) -> bool {
        matches!(self, Self::Parsed { repaired: true, .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Parsed { value, .. } => Some(value),
            Self::Unparsable { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            Self::Parsed { value, .. } => Ok(value),
            Self::Unparsable { reason } => Err(LensError::Extraction(reason)),
        }
    }
}

/// Extract a JSON object from raw model text.
pub fn extract_json(raw: &str) -> Extraction {
    ResponseExtractor::new().extract(raw)
}

// =============================================================================
// ResponseExtractor
// =============================================================================

/// Stateless extractor; a struct so callers can hold one alongside other
/// pipeline parts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, raw: &str) -> Extraction {
        let cleaned = self.preprocess(raw);
        if cleaned.is_empty() {
            return Extraction::unparsable("empty response");
        }

        let found = self
            .greedy_object(&cleaned)
            .or_else(|| self.greedy_array(&cleaned))
            .or_else(|| self.first_object(&cleaned))
            .or_else(|| self.repaired_tail(&cleaned));
        if let Some(found) = found {
            return found;
        }

        if cleaned.contains('{') || cleaned.contains('[') {
            Extraction::unparsable("malformed JSON span")
        } else {
            Extraction::unparsable("no JSON object or array in response")
        }
    }

    /// Largest `{...}` span: first `{` to last `}`.
    fn greedy_object(&self, s: &str) -> Option<Extraction> {
        let start = s.find('{')?;
        let end = s.rfind('}')?;
        if end <= start {
            return None;
        }
        let span = &s[start..=end];

        if let Some(value) = parse_object(span) {
            return Some(Extraction::parsed(value, false));
        }
        let value = parse_object(&self.fix_trailing_commas(span))?;
        debug!("JSON object recovered after trailing-comma repair");
        Some(Extraction::parsed(value, true))
    }

    /// First balanced object, for output holding several objects in prose.
    fn first_object(&self, s: &str) -> Option<Extraction> {
        let start = s.find('{')?;
        let span = self.first_balanced(&s[start..], '{', '}')?;
        let value = parse_object(span)?;
        debug!("JSON object recovered from first balanced span");
        Some(Extraction::parsed(value, false))
    }

    /// Truncated output: everything from the first `{` with closers appended.
    fn repaired_tail(&self, s: &str) -> Option<Extraction> {
        let start = s.find('{')?;
        let tail = self.fix_trailing_commas(&s[start..]);
        let value = parse_object(&self.balance_brackets(&tail))?;
        debug!("JSON object recovered after closing unbalanced brackets");
        Some(Extraction::parsed(value, true))
    }

    /// Largest `[...]` span, wrapped as `{"items": [...]}`.
    fn greedy_array(&self, s: &str) -> Option<Extraction> {
        let start = s.find('[')?;
        let end = s.rfind(']')?;
        if end <= start {
            return None;
        }
        let span = &s[start..=end];

        let (items, repaired) = match serde_json::from_str::<Value>(span) {
            Ok(v @ Value::Array(_)) => (v, false),
            _ => match serde_json::from_str::<Value>(&self.fix_trailing_commas(span)) {
                Ok(v @ Value::Array(_)) => (v, true),
                _ => return None,
            },
        };
        Some(Extraction::parsed(json!({ "items": items }), repaired))
    }

    /// Trim, strip markdown fences and a byte-order mark.
    fn preprocess(&self, raw: &str) -> String {
        let s = raw.trim().trim_start_matches('\u{feff}');
        self.strip_code_fences(s).trim().to_string()
    }

    fn strip_code_fences(&self, s: &str) -> String {
        let mut result = s;

        if result.starts_with("```") {
            result = match result.find('\n') {
                Some(first_newline) => &result[first_newline + 1..],
                None => result.trim_start_matches('`'),
            };
        }

        if let Some(stripped) = result.trim_end().strip_suffix("```") {
            result = stripped;
        }

        result.to_string()
    }

    /// Remove commas that directly precede `]` or `}` outside strings.
    fn fix_trailing_commas(&self, s: &str) -> String {
        let chars: Vec<char> = s.chars().collect();
        let mut result = String::with_capacity(s.len());
        let mut in_string = false;
        let mut escape = false;

        for (i, &ch) in chars.iter().enumerate() {
            if escape {
                escape = false;
                result.push(ch);
                continue;
            }

            match ch {
                '\\' if in_string => escape = true,
                '"' => in_string = !in_string,
                ',' if !in_string => {
                    let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                    if matches!(next, Some(']') | Some('}')) {
                        continue;
                    }
                }
                _ => {}
            }

            result.push(ch);
        }

        result
    }

    /// Close an unterminated string and append missing closers in nesting order.
    fn balance_brackets(&self, s: &str) -> String {
        let mut stack = Vec::new();
        let mut in_string = false;
        let mut escape = false;

        for ch in s.chars() {
            if escape {
                escape = false;
                continue;
            }

            match ch {
                '\\' if in_string => escape = true,
                '"' => in_string = !in_string,
                '{' if !in_string => stack.push('}'),
                '[' if !in_string => stack.push(']'),
                '}' | ']' if !in_string => {
                    stack.pop();
                }
                _ => {}
            }
        }

        let mut result = s.trim_end().to_string();
        if in_string {
            result.push('"');
        }
        let mut result = self.fix_trailing_commas(result.trim_end_matches([',', ' ', '\n', '\t']));
        while let Some(closer) = stack.pop() {
            result.push(closer);
        }
        result
    }

    /// First span from `s[0]` whose `open`/`close` depth returns to zero,
    /// ignoring brackets inside strings.
    fn first_balanced<'a>(&self, s: &'a str, open: char, close: char) -> Option<&'a str> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escape = false;

        for (i, ch) in s.char_indices() {
            if escape {
                escape = false;
                continue;
            }

            match ch {
                '\\' if in_string => escape = true,
                '"' => in_string = !in_string,
                c if c == open && !in_string => depth += 1,
                c if c == close && !in_string => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(&s[..i + ch.len_utf8()]);
                    }
                }
                _ => {}
            }
        }

        None
    }
}

fn parse_object(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}
