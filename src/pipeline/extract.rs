//! Recover a JSON object from raw model text.

use serde_json::{Map, Value};

use crate::error::ExtractError;

/// Span from the first `{` to the last `}`, inclusive.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract the single JSON object embedded in `text`.
///
/// Leading and trailing commentary (including markdown fences) is ignored.
/// The span is greedy, so two sibling objects become one invalid document
/// and fail with `MalformedJson`.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let span = object_span(text).ok_or(ExtractError::NoJsonFound)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ExtractError::MalformedJson(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(ExtractError::MalformedJson(e.to_string())),
    }
}
