//! Interpreting raw model output.

use serde_json::Value;

use liftlog_types::WorkoutDraft;

use crate::validate::validate_candidate;

/// Result of interpreting one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The response was valid and held no usable records.
    Empty,
    /// At least one validated record.
    Records(Vec<WorkoutDraft>),
    /// The response could not be read as records at all.
    Unparseable { reason: String },
}

impl ExtractionOutcome {
    /// Records, or nothing for the empty and unparseable cases.
    pub fn into_records(self) -> Vec<WorkoutDraft> {
        match self {
            ExtractionOutcome::Records(records) => records,
            ExtractionOutcome::Empty | ExtractionOutcome::Unparseable { .. } => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ExtractionOutcome::Records(records) => records.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strip code fences and surrounding prose from a model response.
///
/// Keeps the span from the first `[` or `{` to the last matching closer.
/// Text without any bracket is returned trimmed.
pub fn clean_response(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip a language tag such as `json` on the opening fence line.
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        text = text.trim();
    }

    let Some(open) = text.find(['[', '{']) else {
        return text;
    };
    let closer = if text[open..].starts_with('[') { ']' } else { '}' };
    match text.rfind(closer) {
        Some(close) if close > open => &text[open..=close],
        _ => &text[open..],
    }
}

/// Pull the candidate list out of a decoded response.
fn candidates(value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            if map.contains_key("exercise_name") {
                return Ok(vec![Value::Object(map)]);
            }
            if map.is_empty() {
                return Ok(Vec::new());
            }
            map.into_iter()
                .find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| "object holds neither a record nor an array".to_string())
        }
        other => Err(format!("expected a JSON array, got {}", kind(&other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Clean, decode and validate a model response for `source_text`.
pub fn interpret(raw: &str, source_text: &str) -> ExtractionOutcome {
    let cleaned = clean_response(raw);
    if cleaned.is_empty() {
        return ExtractionOutcome::Unparseable {
            reason: "empty response".to_string(),
        };
    }

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(e) => {
            return ExtractionOutcome::Unparseable {
                reason: format!("invalid JSON: {e}"),
            };
        }
    };

    let items = match candidates(value) {
        Ok(items) => items,
        Err(reason) => return ExtractionOutcome::Unparseable { reason },
    };

    let total = items.len();
    let records: Vec<WorkoutDraft> = items
        .iter()
        .filter_map(|item| validate_candidate(item, source_text))
        .collect();

    if records.len() < total {
        tracing::debug!(
            discarded = total - records.len(),
            kept = records.len(),
            "Discarded invalid candidates"
        );
    }

    if records.is_empty() {
        ExtractionOutcome::Empty
    } else {
        ExtractionOutcome::Records(records)
    }
}
