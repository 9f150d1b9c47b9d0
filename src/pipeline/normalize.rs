//! Coerce an extracted JSON object into a `ClassificationResult`.
//!
//! Never fails. Missing or mistyped fields fall back to safe defaults so a
//! run with a parseable object always produces a reply.

use serde_json::{Map, Value};

use crate::pipeline::types::ClassificationResult;

/// Deferral sent in place of any missing draft.
pub const SAFE_DEFAULT_MESSAGE: &str = "Thank you for reaching out. I have received your \
message and will follow up with a detailed response shortly.";

/// Full safe-default reply including the sign-off.
pub fn safe_default_reply(signature: &str) -> String {
    format!("{SAFE_DEFAULT_MESSAGE}\n\n{signature}")
}

/// Look up `snake`, then its camelCase spelling.
fn field<'m>(object: &'m Map<String, Value>, snake: &str, camel: &str) -> Option<&'m Value> {
    object
        .get(snake)
        .filter(|v| !v.is_null())
        .or_else(|| object.get(camel))
}

/// `true`/`false` or their case-insensitive string forms; anything else is false.
pub fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// String values verbatim; absent, null, non-string or blank → `fallback`.
pub fn coerce_string(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => fallback.to_string(),
    }
}

/// Normalize a parsed model object. `signature` completes the fallback draft.
pub fn normalize(object: &Map<String, Value>, signature: &str) -> ClassificationResult {
    let fallback = safe_default_reply(signature);
    ClassificationResult {
        is_technical: coerce_bool(field(object, "is_technical", "isTechnical")),
        simple_reply_draft: coerce_string(
            field(object, "simple_reply_draft", "simpleReplyDraft"),
            &fallback,
        ),
        non_technical_reply_draft: coerce_string(
            field(object, "non_technical_reply_draft", "nonTechnicalReplyDraft"),
            &fallback,
        ),
        request_meeting: coerce_bool(field(object, "request_meeting", "requestMeeting")),
        meeting_suggestion_draft: coerce_string(
            field(object, "meeting_suggestion_draft", "meetingSuggestionDraft"),
            &fallback,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIG: &str = "Best regards,\nAkash BV";

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn well_formed_object_passes_through() {
        let result = normalize(
            &obj(json!({
                "is_technical": true,
                "simple_reply_draft": "Use ARIMA.",
                "non_technical_reply_draft": "Thanks!",
                "request_meeting": false,
                "meeting_suggestion_draft": "Monday?"
            })),
            SIG,
        );
        assert!(result.is_technical);
        assert!(!result.request_meeting);
        assert_eq!(result.simple_reply_draft, "Use ARIMA.");
        assert_eq!(result.non_technical_reply_draft, "Thanks!");
        assert_eq!(result.meeting_suggestion_draft, "Monday?");
    }

    #[test]
    fn string_booleans_coerced() {
        let result = normalize(
            &obj(json!({"is_technical": "TRUE", "request_meeting": "False"})),
            SIG,
        );
        assert!(result.is_technical);
        assert!(!result.request_meeting);
    }

    #[test]
    fn unrecognized_booleans_are_false() {
        for value in [json!("yes"), json!(1), json!(null), json!([true]), json!({"v": true})] {
            assert!(!coerce_bool(Some(&value)), "{value} should be false");
        }
        assert!(!coerce_bool(None));
    }

    #[test]
    fn missing_strings_use_safe_default() {
        let result = normalize(&obj(json!({"is_technical": false})), SIG);
        let expected = safe_default_reply(SIG);
        assert_eq!(result.simple_reply_draft, expected);
        assert_eq!(result.non_technical_reply_draft, expected);
        assert_eq!(result.meeting_suggestion_draft, expected);
        assert!(expected.ends_with(SIG));
    }

    #[test]
    fn null_wrong_typed_and_blank_strings_use_safe_default() {
        let result = normalize(
            &obj(json!({
                "simple_reply_draft": null,
                "non_technical_reply_draft": 42,
                "meeting_suggestion_draft": "   "
            })),
            SIG,
        );
        let expected = safe_default_reply(SIG);
        assert_eq!(result.simple_reply_draft, expected);
        assert_eq!(result.non_technical_reply_draft, expected);
        assert_eq!(result.meeting_suggestion_draft, expected);
    }

    #[test]
    fn camel_case_keys_accepted() {
        let result = normalize(
            &obj(json!({
                "isTechnical": true,
                "requestMeeting": "true",
                "meetingSuggestionDraft": "Are you free Monday?"
            })),
            SIG,
        );
        assert!(result.is_technical);
        assert!(result.request_meeting);
        assert_eq!(result.meeting_suggestion_draft, "Are you free Monday?");
    }

    #[test]
    fn snake_case_wins_over_camel_case() {
        let result = normalize(
            &obj(json!({"is_technical": false, "isTechnical": true})),
            SIG,
        );
        assert!(!result.is_technical);
    }

    #[test]
    fn safe_default_is_a_valid_greeting() {
        assert!(safe_default_reply(SIG).to_lowercase().starts_with("thank you"));
    }
}
