//! Final reply formatting: strip markup, enforce a greeting, build the subject.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::FinalReply;

/// Greeting prepended when the draft does not open with one.
pub const DEFAULT_GREETING: &str = "Hello,\n\n";

/// Accepted openings, checked against the lowercased body.
pub const GREETING_PREFIXES: [&str; 4] = ["hello", "hi", "thank you", "dear"];

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Remove every `<...>` token.
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

fn has_greeting(text: &str) -> bool {
    let lower = text.to_lowercase();
    GREETING_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Strip tags, trim, and prepend a greeting when missing.
///
/// An empty draft yields just `"Hello,"` so that formatting stays idempotent.
pub fn format_body(draft: &str) -> String {
    let cleaned = strip_tags(draft);
    let trimmed = cleaned.trim();
    if has_greeting(trimmed) {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_GREETING}{trimmed}").trim_end().to_string()
    }
}

/// `"Re: "` plus the original subject, unmodified.
pub fn reply_subject(original: &str) -> String {
    format!("Re: {original}")
}

/// Build the reply for a selected draft.
pub fn format_reply(draft: &str, original_subject: &str) -> FinalReply {
    FinalReply {
        subject: reply_subject(original_subject),
        body: format_body(draft),
    }
}
